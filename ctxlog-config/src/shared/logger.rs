use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default rotation threshold of the active log file, 3 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 3 * 1024 * 1024;

/// Default number of rolled files kept next to the active one.
pub const DEFAULT_MAX_BACKUPS: usize = 30;

/// Process logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Path of the active log file used outside of development.
    pub path: PathBuf,
    /// Severity name, e.g. `debug` or `warn`. Empty or unknown names fall back to `info`.
    #[serde(default)]
    pub level: String,
    /// Rolling policy of the log file.
    #[serde(default)]
    pub rotation: RotationConfig,
}

impl LoggerConfig {
    /// Creates a configuration for `path` and `level` with the default rotation policy.
    pub fn new(path: impl Into<PathBuf>, level: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            level: level.into(),
            rotation: RotationConfig::default(),
        }
    }

    /// Validates the [`LoggerConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyPath);
        }

        self.rotation.validate()
    }
}

/// Size based rolling policy for the log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// The active file is rolled once a write would grow it past this many bytes.
    pub max_size_bytes: u64,
    /// Maximum number of rolled files to retain. Older ones are deleted.
    pub max_backups: usize,
    /// Whether rolled files are gzip compressed.
    pub compress: bool,
}

impl RotationConfig {
    /// Validates the [`RotationConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size_bytes == 0 {
            return Err(ValidationError::MaxSizeBytesZero);
        }

        Ok(())
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
            compress: true,
        }
    }
}
