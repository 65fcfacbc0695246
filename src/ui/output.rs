//! Styled output helpers with plain fallback

use super::context::UiContext;
use console::style;

/// Open a command's output block
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("=== {} ===", title);
    }
}

/// Close the block on success
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{}", message);
    }
}

/// Close the block with a warning
pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

/// A step that was skipped or degraded
pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        cliclack::log::warning(message).ok();
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

/// A titled multi-line block, used for summaries
pub fn note(ctx: &UiContext, title: &str, body: &str) {
    if ctx.is_interactive() {
        cliclack::note(title, body).ok();
    } else {
        println!("{}:", title);
        for line in body.lines() {
            println!("  {}", line);
        }
    }
}
