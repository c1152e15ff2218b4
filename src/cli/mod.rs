//! Command-line parsing for the kernel cache replay driver.

pub mod config;
pub mod error;

pub use config::{CliConfig, Command, OutputFormat, ReplayArgs, parse_hex};
pub use error::CliError;
