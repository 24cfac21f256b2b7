use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The log file path is empty.
    #[error("`path` cannot be empty")]
    EmptyPath,
    /// The rotation threshold cannot be zero.
    #[error("`rotation.max_size_bytes` cannot be zero")]
    MaxSizeBytesZero,
}
