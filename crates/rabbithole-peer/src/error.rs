use crate::session::SessionState;

/// Errors that can occur while negotiating or using a channel.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Socket connect or I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] rabbithole_transport::TransportError),

    /// Frame-level failure, including short reads.
    #[error("frame error: {0}")]
    Frame(#[from] rabbithole_frame::FrameError),

    /// The rendezvous reply did not carry a usable socket path.
    #[error("malformed handoff: {0}")]
    MalformedHandoff(String),

    /// A broadcast event payload could not be built or parsed.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// An operation was attempted from the wrong session state.
    #[error("invalid session state: expected {expected}, currently {actual}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// The peer went away before the exchange completed.
    #[error("peer disconnected: {0}")]
    Disconnected(String),
}

impl PeerError {
    /// Whether this failure came from the socket rather than from bad data.
    pub fn is_connection_error(&self) -> bool {
        match self {
            PeerError::Transport(_) | PeerError::Disconnected(_) => true,
            PeerError::Frame(err) => matches!(
                err,
                rabbithole_frame::FrameError::Io(_) | rabbithole_frame::FrameError::ConnectionClosed
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
