//! Error types for prsheet

use thiserror::Error;

/// Result type alias for prsheet core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for prsheet core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("{0}")]
    Config(String),

    /// One or more required settings are absent
    #[error("Missing configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),
}
