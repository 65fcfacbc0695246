//! Terminal output and prompts
//!
//! Interactive runs get `cliclack` styling with spinners; CI and piped
//! output fall back to plain lines. Commands never print directly, they go
//! through here so both modes stay consistent.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{intro, note, outro_success, outro_warn, step_warn};
pub use progress::TaskSpinner;
pub use prompts::confirm;
