//! CLI command handlers, one per file.

mod completions;
mod config;
mod man;
pub mod tail;

pub use completions::run_completions;
pub use config::run_config;
pub use man::run_man;
pub use tail::{run_tail, TailOptions};
