//! Configuration for a claim board.
//!
//! Resolution order (later wins):
//! 1. built-in defaults
//! 2. `baton.toml` in the working directory, or the file passed explicitly
//! 3. `BATON_ROOT` / `BATON_TTL_SECS` environment variables

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::DEFAULT_TTL_SECS;

/// Name of the config file picked up from the working directory.
pub const CONFIG_FILE_NAME: &str = "baton.toml";

pub const ENV_ROOT: &str = "BATON_ROOT";
pub const ENV_TTL_SECS: &str = "BATON_TTL_SECS";

/// Upper bound for `recent_window_secs` (30 days).
pub const MAX_RECENT_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Directory holding `claims/` and `agents/`; shared by every worker.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// TTL applied when a claim does not pick one.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Trailing window for the status "recent activity" list.
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,

    /// Period of `sweep --watch`.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".baton")
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_recent_window_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_ttl_secs: default_ttl_secs(),
            recent_window_secs: default_recent_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
}

impl BoardConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit file (must exist), else `baton.toml` if present, else defaults;
    /// then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_NAME).is_file() => Self::from_file(CONFIG_FILE_NAME)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        debug!(root = %config.root.display(), ttl = config.default_ttl_secs, "config loaded");
        Ok(config)
    }

    /// Applies `BATON_*` overrides obtained through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(root) = lookup(ENV_ROOT).filter(|v| !v.is_empty()) {
            self.root = PathBuf::from(root);
        }
        if let Some(value) = lookup(ENV_TTL_SECS) {
            self.default_ttl_secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TTL_SECS,
                value,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Zero("default_ttl_secs"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero("sweep_interval_secs"));
        }
        if self.recent_window_secs > MAX_RECENT_WINDOW_SECS {
            return Err(ConfigError::TooLarge {
                field: "recent_window_secs",
                max: MAX_RECENT_WINDOW_SECS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("baton.toml");
        std::fs::write(&path, "root = \"/srv/shared/.baton\"\ndefault_ttl_secs = 600\n").unwrap();

        let config = BoardConfig::from_file(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/shared/.baton"));
        assert_eq!(config.default_ttl_secs, 600);
        assert_eq!(config.recent_window_secs, 300);
        assert_eq!(config.sweep_interval_secs, 30);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("baton.toml");
        std::fs::write(&path, "default_ttl_secs = \"soon\"").unwrap();

        assert!(matches!(
            BoardConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.toml");
        let result = BoardConfig::load(Some(missing.as_path()));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_ROOT, "/tmp/board"), (ENV_TTL_SECS, " 45 ")]);
        let mut config = BoardConfig::default();
        config
            .apply_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/board"));
        assert_eq!(config.default_ttl_secs, 45);
    }

    #[test]
    fn bad_ttl_override_is_rejected() {
        let mut config = BoardConfig::default();
        let err = config
            .apply_overrides(|var| (var == ENV_TTL_SECS).then(|| "five".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_TTL_SECS, .. }));
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let config = BoardConfig {
            default_ttl_secs: 0,
            ..BoardConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("default_ttl_secs"))));
    }

    #[test]
    fn oversized_recent_window_fails_validation() {
        let config = BoardConfig {
            recent_window_secs: u64::MAX,
            ..BoardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge { field: "recent_window_secs", .. })
        ));

        let at_bound = BoardConfig {
            recent_window_secs: MAX_RECENT_WINDOW_SECS,
            ..BoardConfig::default()
        };
        assert!(at_bound.validate().is_ok());
    }
}
