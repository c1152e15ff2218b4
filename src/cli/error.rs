use thiserror::Error;

/// Rejected command line input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("{flag} must be at least 1")]
    ZeroCount { flag: &'static str },

    #[error("--layers must be between 1 and {max}, got {layers}")]
    LayerCount { layers: usize, max: usize },

    #[error("odd number of hex digits in {input:?}")]
    OddHexLength { input: String },

    #[error("{pair:?} is not a hex byte")]
    BadHexByte { pair: String },
}
