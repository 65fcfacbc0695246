//! Task spinner with plain fallback

use super::context::UiContext;
use console::style;

/// Spinner for long-running steps (repo sync, registry enumeration)
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.is_interactive(),
        }
    }

    /// Start spinning with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with a success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with an error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}
