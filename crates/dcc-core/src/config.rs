use crate::record::MagicPolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DISTCC_DIR_ENV: &str = "DISTCC_DIR";
pub const STATE_DIR_ENV: &str = "DCC_MONITOR_STATE_DIR";
pub const POLL_MS_ENV: &str = "DCC_MONITOR_POLL_MS";
pub const INITIAL_DELAY_MS_ENV: &str = "DCC_MONITOR_INITIAL_DELAY_MS";
pub const STRICT_MAGIC_ENV: &str = "DCC_MONITOR_STRICT_MAGIC";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "cannot locate a home directory; set {} or {}",
        DISTCC_DIR_ENV,
        STATE_DIR_ENV
    )]
    NoHomeDir,
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            initial_delay: Duration::ZERO,
        }
    }
}

impl PollTiming {
    pub fn new(interval: Duration, initial_delay: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            initial_delay,
        }
    }

    pub fn from_millis(interval_ms: u64, initial_delay_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(initial_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub state_dir: PathBuf,
    pub timing: PollTiming,
    pub magic_policy: MagicPolicy,
}

impl MonitorConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            timing: PollTiming::default(),
            magic_policy: MagicPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|_| None)
    }

    /// Like [`MonitorConfig::from_env`], but `overrides` is consulted before the
    /// environment for each variable (command-line flags map onto it).
    pub fn from_env_with<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(
            |key| overrides(key).or_else(|| std::env::var(key).ok()),
            dirs::home_dir(),
        )
    }

    pub fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let state_dir = if let Some(dir) = non_blank(STATE_DIR_ENV) {
            PathBuf::from(dir)
        } else if let Some(dir) = non_blank(DISTCC_DIR_ENV) {
            PathBuf::from(dir).join("state")
        } else {
            home.ok_or(ConfigError::NoHomeDir)?
                .join(".distcc")
                .join("state")
        };

        let interval_ms = match non_blank(POLL_MS_ENV) {
            Some(value) => parse_millis(POLL_MS_ENV, value)?,
            None => DEFAULT_POLL_INTERVAL.as_millis() as u64,
        };
        let initial_delay_ms = match non_blank(INITIAL_DELAY_MS_ENV) {
            Some(value) => parse_millis(INITIAL_DELAY_MS_ENV, value)?,
            None => 0,
        };
        let magic_policy = match non_blank(STRICT_MAGIC_ENV) {
            Some(value) => match parse_bool_flag(&value) {
                Some(true) => MagicPolicy::Strict,
                Some(false) => MagicPolicy::Permissive,
                None => {
                    return Err(ConfigError::InvalidValue {
                        var: STRICT_MAGIC_ENV,
                        value,
                    })
                }
            },
            None => MagicPolicy::Permissive,
        };

        Ok(Self {
            state_dir,
            timing: PollTiming::from_millis(interval_ms, initial_delay_ms),
            magic_policy,
        })
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_millis(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
