use clap::{Args, Parser, Subcommand};
use kdll::caching::MAX_FILTER_ENTRIES;

use super::error::CliError;
use crate::replay::WorkloadConfig;

/// Command-line interface configuration for the kernel cache driver
#[derive(Debug, Parser)]
#[command(name = "kdll_cli")]
#[command(about = "Replay synthetic frame workloads through the combined-kernel cache", long_about = None)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format (text, json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a seeded frame workload and print cache statistics
    Replay(ReplayArgs),
    /// Print the FNV-1a hash and bucket of a hex byte string
    Hash {
        #[arg(value_name = "HEX_BYTES")]
        bytes: String,
    },
}

/// Workload options for `replay`
#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Number of frames to render
    #[arg(long, default_value_t = 10_000)]
    pub frames: usize,

    /// Number of distinct filters the workload draws from
    #[arg(long, default_value_t = 128)]
    pub distinct_filters: usize,

    /// Maximum source layers per frame
    #[arg(long, default_value_t = 3)]
    pub layers: usize,

    /// Frames whose kernels stay in flight and cannot be evicted
    #[arg(long, default_value_t = 2)]
    pub pinned: usize,

    /// Workload seed
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u64,
}

impl Default for ReplayArgs {
    fn default() -> Self {
        Self {
            frames: 10_000,
            distinct_filters: 128,
            layers: 3,
            pinned: 2,
            seed: 0x5eed,
        }
    }
}

impl ReplayArgs {
    pub fn workload(&self) -> WorkloadConfig {
        WorkloadConfig {
            frames: self.frames,
            distinct_filters: self.distinct_filters,
            layers: self.layers,
            pinned: self.pinned,
            seed: self.seed,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable summary (default)
    Text,
    /// JSON output mode
    Json,
}

impl CliConfig {
    /// Reject option combinations the replay cannot honour.
    pub fn validate(&self) -> Result<(), CliError> {
        let Command::Replay(args) = &self.command else {
            return Ok(());
        };
        if args.frames == 0 {
            return Err(CliError::ZeroCount { flag: "--frames" });
        }
        if args.distinct_filters == 0 {
            return Err(CliError::ZeroCount {
                flag: "--distinct-filters",
            });
        }
        if args.layers == 0 || args.layers >= MAX_FILTER_ENTRIES {
            return Err(CliError::LayerCount {
                layers: args.layers,
                max: MAX_FILTER_ENTRIES - 1,
            });
        }
        Ok(())
    }
}

/// Decode a hex byte string; whitespace, `_` and a leading `0x` are ignored.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let trimmed = input.trim();
    let digits: Vec<u8> = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b'_')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::OddHexLength { input: input.to_owned() });
    }
    digits
        .chunks(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(high), Some(low)) => Ok(high << 4 | low),
            _ => Err(CliError::BadHexByte {
                pair: String::from_utf8_lossy(pair).into_owned(),
            }),
        })
        .collect()
}

fn nibble(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|value| value as u8)
}
