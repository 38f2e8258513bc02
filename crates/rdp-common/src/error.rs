//! Error types shared across RDP components

use thiserror::Error;

/// Result type alias for RDP operations
pub type Result<T> = std::result::Result<T, RdpError>;

/// Shared error type for RDP utility code
#[derive(Error, Debug)]
pub enum RdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
