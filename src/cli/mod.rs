//! Command-line interface

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
