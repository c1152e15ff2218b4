//! Log level and metric sink settings, read once from `KDLL_*` variables.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Level;

use kdll_env::{EnvVarError, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH, TypedEnvVar};

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("app configuration already initialised")]
    AlreadyInitialised,
    #[error("invalid log level '{value}'")]
    InvalidLogLevel { value: String },
    #[error("invalid boolean flag '{value}' for {name}")]
    InvalidBoolean { name: &'static str, value: String },
    #[error("failed to access instrumentation environment: {source}")]
    EnvVar {
        #[from]
        source: EnvVarError,
    },
}

/// Where logs and metric events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: Level,
    /// Metric events are appended here as JSON lines when set.
    pub metrics_jsonl_path: Option<PathBuf>,
    pub enable_console_metrics: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            metrics_jsonl_path: None,
            enable_console_metrics: false,
        }
    }
}

/// Levels from quietest to noisiest; `-v` moves one step right.
const VERBOSITY_LADDER: [Level; 5] = [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE];

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Reads `var`, handing a malformed raw value to `invalid` so each setting
/// reports its own error.
fn read<T>(var: &TypedEnvVar<T>, invalid: impl FnOnce(String) -> AppConfigError) -> Result<Option<T>, AppConfigError> {
    match var.get() {
        Ok(value) => Ok(value),
        Err(EnvVarError::Parse { value, .. }) => Err(invalid(value)),
        Err(other) => Err(other.into()),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppConfigError> {
        let defaults = Self::default();
        let log_level = read(&LOG_LEVEL, |value| AppConfigError::InvalidLogLevel { value })?.unwrap_or(defaults.log_level);
        let enable_console_metrics = read(&METRICS_CONSOLE, |value| AppConfigError::InvalidBoolean {
            name: METRICS_CONSOLE.key(),
            value,
        })?
        .unwrap_or(defaults.enable_console_metrics);

        Ok(Self {
            log_level,
            metrics_jsonl_path: METRICS_JSONL_PATH.get()?,
            enable_console_metrics,
        })
    }

    /// Raise the log level by `steps`, saturating at TRACE.
    #[must_use]
    pub fn with_verbosity(mut self, steps: u8) -> Self {
        let current = VERBOSITY_LADDER.iter().position(|level| *level == self.log_level).unwrap_or(2);
        let raised = (current + usize::from(steps)).min(VERBOSITY_LADDER.len() - 1);
        self.log_level = VERBOSITY_LADDER[raised];
        self
    }

    /// True when at least one metric exporter is configured.
    pub fn exports_metrics(&self) -> bool {
        self.metrics_jsonl_path.is_some() || self.enable_console_metrics
    }

    /// Install `config` as the process-wide configuration. Only the first call wins.
    pub fn initialise(config: AppConfig) -> Result<&'static Self, AppConfigError> {
        APP_CONFIG.set(config).map_err(|_| AppConfigError::AlreadyInitialised)?;
        APP_CONFIG.get().ok_or(AppConfigError::AlreadyInitialised)
    }

    pub fn try_global() -> Option<&'static Self> {
        APP_CONFIG.get()
    }
}
