// Harness configuration, resolved from the environment
use crate::report::ReportMode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_INTERPRETER_CONFIG: &str = "config/interpreters.json";

pub const ENV_PROD: &str = "PROD";
pub const ENV_TIMEOUT_SECS: &str = "HARNESS_TIMEOUT_SECS";
pub const ENV_FIXTURE_ROOT: &str = "HARNESS_FIXTURE_ROOT";
pub const ENV_INTERPRETERS: &str = "HARNESS_INTERPRETERS";
pub const ENV_LOG_FORMAT: &str = "HARNESS_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive whole number of seconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Budget applied separately to validation and execution
    pub phase_timeout: Duration,
    pub fixture_root: PathBuf,
    pub interpreter_config: PathBuf,
    pub report_mode: ReportMode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(DEFAULT_PHASE_TIMEOUT_SECS),
            fixture_root: PathBuf::from("."),
            interpreter_config: PathBuf::from(DEFAULT_INTERPRETER_CONFIG),
            report_mode: ReportMode::Local,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout {
                    var: ENV_TIMEOUT_SECS,
                    value: value.clone(),
                })?;
            config.phase_timeout = Duration::from_secs(secs);
        }

        if let Some(root) = lookup(ENV_FIXTURE_ROOT).filter(|v| !v.is_empty()) {
            config.fixture_root = PathBuf::from(root);
        }

        if let Some(path) = lookup(ENV_INTERPRETERS).filter(|v| !v.is_empty()) {
            config.interpreter_config = PathBuf::from(path);
        }

        config.report_mode = ReportMode::from_flag(lookup(ENV_PROD).as_deref());

        Ok(config)
    }
}
