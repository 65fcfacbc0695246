//! Confirmation prompts with non-interactive fallback

use super::context::UiContext;
use crate::error::{StagekeepError, StagekeepResult};

/// Ask for confirmation. Auto-yes approves without asking; a
/// non-interactive run takes the default.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> StagekeepResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack prompts block, so they run off the async threads
    let message = message.to_string();
    let answer = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| StagekeepError::User(format!("Prompt task failed: {e}")))?;

    answer.map_err(|e| StagekeepError::User(format!("Prompt failed: {e}")))
}
