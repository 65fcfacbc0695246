//! Interactive vs plain-output detection

use std::io::IsTerminal;

/// Decides how commands talk to the terminal
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Detect from the environment: both stdio streams must be terminals
    /// and no CI marker may be set.
    pub fn detect() -> Self {
        Self {
            interactive: detect_interactive(),
            auto_yes: false,
        }
    }

    /// Plain-output context for tests and explicit CI mode
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Auto-approve prompts (`--yes`)
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }
}

fn detect_interactive() -> bool {
    if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
        return false;
    }

    const CI_VARS: &[&str] = &[
        "CI",
        "GITHUB_ACTIONS",
        "GITLAB_CI",
        "JENKINS_URL",
        "BUILDKITE",
    ];
    CI_VARS.iter().all(|var| std::env::var(var).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_defaults() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.auto_yes());
    }

    #[test]
    fn auto_yes_flag() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(ctx.auto_yes());
    }
}
