//! Output formatting for CLI.

mod json;
mod text;

pub use json::{ConfigOutput, JsonFormatter, PathsOutput};
pub use text::TextFormatter;
