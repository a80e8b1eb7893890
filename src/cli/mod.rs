//! CLI layer for docent.
//!
//! Provides the command-line interface using clap: asking questions about
//! documents, printing document digests and managing prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ModeArg};
