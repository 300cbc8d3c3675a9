//! Configuration models for tfresume.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest version tag a checkpoint line may carry.
pub const MAX_VERSION_LEN: usize = 80;

/// Upper bound for `checkpoint.delay_secs`.
pub const MAX_CHECKPOINT_DELAY_SECS: u64 = 3600;

/// Highest meaningful verbosity level.
pub const MAX_VERBOSITY: u8 = 3;

/// Class counts for the two sieve layouts.
pub const NUM_CLASSES_MORE: u32 = 4620;
pub const NUM_CLASSES_FEWER: u32 = 420;

/// Top-level configuration for tfresume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Diagnostic volume: 0 silent, 1 informational, 2+ verbose
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Use the 4620-class sieve layout instead of 420 classes
    #[serde(default = "default_true")]
    pub more_classes: bool,

    /// Checkpoint settings
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

/// Checkpoint settings.
///
/// K_i: `interval` 0 disables checkpoints, 1 writes on a timer,
/// N > 1 writes every N classes and ignores the timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding the checkpoint files
    /// Values can contain ${ENV_VAR} for environment variable expansion
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Checkpoint cadence (see type docs)
    #[serde(default = "default_interval")]
    pub interval: u32,

    /// Minimum seconds between timer-driven checkpoints
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Version tag written into every checkpoint
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_verbosity() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interval() -> u32 {
    1
}

fn default_delay_secs() -> u64 {
    300
}

fn default_version() -> String {
    format!("tfresume-{}", env!("CARGO_PKG_VERSION"))
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            interval: default_interval(),
            delay_secs: default_delay_secs(),
            version: default_version(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: default_verbosity(),
            more_classes: default_true(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Number of sieve classes for the configured layout.
    pub fn num_classes(&self) -> u32 {
        if self.more_classes {
            NUM_CLASSES_MORE
        } else {
            NUM_CLASSES_FEWER
        }
    }

    /// Checkpoint directory with environment variables expanded.
    pub fn checkpoint_dir(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.checkpoint.dir.to_string_lossy()))
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verbosity > MAX_VERBOSITY {
            return Err(ConfigError::invalid(
                "verbosity",
                format!("must be at most {MAX_VERBOSITY}"),
            ));
        }
        if self.checkpoint.delay_secs > MAX_CHECKPOINT_DELAY_SECS {
            return Err(ConfigError::invalid(
                "checkpoint.delay_secs",
                format!("must be at most {MAX_CHECKPOINT_DELAY_SECS}"),
            ));
        }
        validate_version(&self.checkpoint.version)
    }
}

/// A version tag must fit the checkpoint line: bounded length, single
/// line, and no `": "` (the reader splits on its first occurrence).
pub fn validate_version(version: &str) -> Result<(), ConfigError> {
    if version.len() > MAX_VERSION_LEN {
        return Err(ConfigError::invalid(
            "checkpoint.version",
            format!("longer than {MAX_VERSION_LEN} bytes"),
        ));
    }
    if version.contains(": ") || version.contains(['\n', '\r']) {
        return Err(ConfigError::invalid(
            "checkpoint.version",
            "must not contain \": \" or line breaks",
        ));
    }
    Ok(())
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex")
    });

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
/// - I^R unresolved: Value outside its documented range
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
