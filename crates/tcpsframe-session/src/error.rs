/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tcpsframe_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tcpsframe_frame::FrameError),

    /// A shutdown was requested while a cycle was in flight.
    #[error("session cancelled")]
    Cancelled,

    /// The session already reached its terminal state.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether a read or write deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Frame(tcpsframe_frame::FrameError::Timeout))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
