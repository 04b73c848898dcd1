//! Error types for the negotiation engine

/// Result type alias using the negotiation Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating a peer connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Relay declined a session request (start/stop)
    #[error("Relay rejected: {0}")]
    RelayRejected(String),

    /// Relay channel error (send failure, channel gone)
    #[error("Relay error: {0}")]
    RelayError(String),

    /// Local media capture denied or unavailable
    #[error("Media capture failed: {0}")]
    MediaCapture(String),

    /// Connection engine failure (creation, close, internal)
    #[error("Engine error: {0}")]
    Engine(String),

    /// Description creation/application rejected by the engine
    #[error("SDP negotiation error: {0}")]
    Sdp(String),

    /// Connectivity candidate rejected by the engine
    #[error("Candidate error: {0}")]
    Candidate(String),

    /// Malformed or unknown relay message, rejected at the boundary
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation invoked in a state that does not permit it
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is fatal for the session (triggers teardown)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Engine(_) | Error::Sdp(_) | Error::Candidate(_) | Error::Internal(_)
        )
    }

    /// Check if this error was rejected at the relay boundary
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if this error leaves the session unestablished but retryable
    pub fn is_media_error(&self) -> bool {
        matches!(self, Error::MediaCapture(_))
    }
}
