//! Runtime configuration.
//!
//! # Responsibility
//! - Load `messcut.toml` settings with environment overrides.
//! - Own the one definition of the deadline/advance-window policy.
//!
//! # Invariants
//! - A missing config file yields defaults; a malformed one is an error.
//! - `deadline_time` is `HH:MM` on a 24h clock, interpreted in UTC.

use crate::policy::window::{WindowPolicy, DEFAULT_ADVANCE_DAYS, DEFAULT_DEADLINE_HOUR};
use chrono::NaiveTime;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "MESSCUT_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "MESSCUT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "MESSCUT_LOG_DIR";
pub const ENV_DEADLINE_TIME: &str = "MESSCUT_DEADLINE_TIME";
pub const ENV_ADVANCE_DAYS: &str = "MESSCUT_ADVANCE_DAYS";

const MAX_ADVANCE_DAYS: u32 = 366;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, reason: String },
    Parse { path: PathBuf, reason: String },
    Validation(String),
    Serialize(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, reason } => {
                write!(f, "failed to read config file at {}: {reason}", path.display())
            }
            Self::Parse { path, reason } => {
                write!(f, "failed to parse config file at {}: {reason}", path.display())
            }
            Self::Validation(message) => write!(f, "invalid configuration: {message}"),
            Self::Serialize(reason) => write!(f, "failed to render configuration: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Root configuration, mapped from `messcut.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// `trace|debug|info|warn|error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Absolute directory for rolling logs; file logging is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Marking window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_deadline_time")]
    pub deadline_time: String,

    #[serde(default = "default_advance_days")]
    pub advance_days: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("messcut.sqlite3")
}
fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}
fn default_deadline_time() -> String {
    format!("{DEFAULT_DEADLINE_HOUR:02}:00")
}
fn default_advance_days() -> u32 {
    DEFAULT_ADVANCE_DAYS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            log_dir: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deadline_time: default_deadline_time(),
            advance_days: default_advance_days(),
        }
    }
}

impl PolicyConfig {
    /// Parses `deadline_time` as `HH:MM`.
    pub fn parsed_deadline_time(&self) -> Result<NaiveTime, ConfigError> {
        let value = self.deadline_time.trim();
        NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
            ConfigError::Validation(format!(
                "deadline_time `{value}` must be HH:MM (24h)"
            ))
        })
    }

    /// Builds the window policy these settings describe.
    pub fn window_policy(&self) -> Result<WindowPolicy, ConfigError> {
        Ok(WindowPolicy::new(
            self.parsed_deadline_time()?,
            self.advance_days,
        ))
    }
}

impl AppConfig {
    /// Loads `path` (defaults when missing) and applies process env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads configuration from a specific file path without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(
                "event=config_load module=config status=default path={}",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let config = Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        info!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MESSCUT_*` overrides resolved through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_DEADLINE_TIME) {
            self.policy.deadline_time = value;
        }
        if let Some(value) = lookup(ENV_ADVANCE_DAYS) {
            self.policy.advance_days = value.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{ENV_ADVANCE_DAYS} `{value}` is not a number"))
            })?;
        }
        self.validate()
    }

    pub fn window_policy(&self) -> Result<WindowPolicy, ConfigError> {
        self.policy.window_policy()
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.policy.parsed_deadline_time()?;
        if self.policy.advance_days > MAX_ADVANCE_DAYS {
            return Err(ConfigError::Validation(format!(
                "advance_days must be at most {MAX_ADVANCE_DAYS}, got {}",
                self.policy.advance_days
            )));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ENV_ADVANCE_DAYS, ENV_DEADLINE_TIME};
    use chrono::NaiveTime;
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn defaults_match_policy_constants() {
        let config = AppConfig::default();
        assert_eq!(config.policy.deadline_time, "19:00");
        assert_eq!(config.policy.advance_days, 7);
        let policy = config.window_policy().unwrap();
        assert_eq!(policy.deadline_time(), NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config = AppConfig::from_toml_str(
            r#"
database_path = "/var/lib/messcut/data.sqlite3"

[policy]
advance_days = 3
"#,
        )
        .unwrap();
        assert_eq!(config.policy.advance_days, 3);
        assert_eq!(config.policy.deadline_time, "19:00");
        assert_eq!(
            config.database_path,
            Path::new("/var/lib/messcut/data.sqlite3")
        );
    }

    #[test]
    fn invalid_deadline_time_is_rejected() {
        let err = AppConfig::from_toml_str("[policy]\ndeadline_time = \"7pm\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_DEADLINE_TIME, "18:30"), (ENV_ADVANCE_DAYS, "10")]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();

        let policy = config.window_policy().unwrap();
        assert_eq!(policy.deadline_time(), NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(policy.advance_days(), 10);
    }

    #[test]
    fn non_numeric_advance_days_override_fails() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_ADVANCE_DAYS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ADVANCE_DAYS));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn toml_roundtrip_preserves_policy() {
        let mut config = AppConfig::default();
        config.policy.advance_days = 14;
        let parsed = AppConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_database_path_fails_to_render() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use std::path::PathBuf;

        let config = AppConfig {
            database_path: PathBuf::from(OsStr::from_bytes(b"/tmp/\xff.sqlite3")),
            ..AppConfig::default()
        };
        let err = config.to_toml_string().unwrap_err();
        assert!(matches!(err, ConfigError::Serialize(_)), "{err}");
    }
}
