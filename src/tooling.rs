//! Tooling layer
//!
//! Command-line front end over the backup orchestration.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
