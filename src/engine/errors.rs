//! Error types for the browser engine boundary.

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for browser engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Browser process could not be launched
    #[error("failed to launch browser process: {0}")]
    Launch(String),

    /// A devtools protocol command failed
    #[error("browser protocol error: {0}")]
    Protocol(String),

    /// Operation attempted on a closed page
    #[error("page is closed")]
    PageClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
