use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device endpoint.
    #[error("failed to open {endpoint}: {source}")]
    Open {
        endpoint: PathBuf,
        source: std::io::Error,
    },

    /// No data arrived before the receive deadline.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// The operation requires an open transport.
    #[error("transport is not open")]
    NotOpen,

    /// The remote end closed the endpoint.
    #[error("transport closed by device")]
    Closed,

    /// An I/O error occurred on the endpoint.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error is a receive timeout rather than a fatal failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
