//! Variables read by `kdll_instrumentation` when it sets up logging and metric sinks.

use std::path::PathBuf;

use tracing::Level;

use super::EnvVar;
use super::value::{EnvVarFormatError, EnvVarParseError, TypedEnvVar, format_display, parse_bool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentEnvVar {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    LogLevel,
    /// File that metric events are appended to, one JSON object per line.
    MetricsJsonlPath,
    /// Echo metric events to stdout.
    MetricsConsole,
}

impl InstrumentEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            InstrumentEnvVar::LogLevel => "KDLL_LOG_LEVEL",
            InstrumentEnvVar::MetricsJsonlPath => "KDLL_METRICS_JSONL_PATH",
            InstrumentEnvVar::MetricsConsole => "KDLL_METRICS_CONSOLE",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Instrument(self)
    }
}

pub const LOG_LEVEL: TypedEnvVar<Level> = TypedEnvVar::new(InstrumentEnvVar::LogLevel.into_env(), parse_log_level, format_display);

pub const METRICS_JSONL_PATH: TypedEnvVar<PathBuf> =
    TypedEnvVar::new(InstrumentEnvVar::MetricsJsonlPath.into_env(), parse_path, format_path);

pub const METRICS_CONSOLE: TypedEnvVar<bool> = TypedEnvVar::new(InstrumentEnvVar::MetricsConsole.into_env(), parse_bool, format_display);

fn parse_log_level(value: &str) -> Result<Level, EnvVarParseError> {
    value.parse::<Level>().map_err(|_| EnvVarParseError::new("invalid tracing level"))
}

fn parse_path(value: &str) -> Result<PathBuf, EnvVarParseError> {
    (!value.is_empty())
        .then(|| PathBuf::from(value))
        .ok_or_else(|| EnvVarParseError::new("path must not be empty"))
}

fn format_path(path: &PathBuf) -> Result<String, EnvVarFormatError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| EnvVarFormatError::new("path is not valid UTF-8"))
}
