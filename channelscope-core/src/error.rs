//! Error types for channelscope-core

use thiserror::Error;

/// Main error type for the channelscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Reference is not a usable Telegram channel reference
    #[error("invalid channel reference: {0}")]
    InvalidReference(String),

    /// Channel does not exist upstream
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// Channel exists but cannot be read (private or restricted)
    #[error("channel is private: {0}")]
    ChannelPrivate(String),

    /// Transport or protocol failure talking to the upstream source
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream fetch did not finish in time
    #[error("upstream fetch timed out after {0}s")]
    Timeout(u64),
}

impl Error {
    /// Whether this error means the channel itself is unavailable, as
    /// opposed to a transient failure reaching the upstream source.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ChannelNotFound(_) | Error::ChannelPrivate(_) | Error::InvalidReference(_)
        )
    }
}

/// Result type alias for channelscope-core
pub type Result<T> = std::result::Result<T, Error>;
