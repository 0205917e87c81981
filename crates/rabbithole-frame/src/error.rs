/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes were available than the frame header declared.
    ///
    /// Both counts cover the whole frame (tag, length prefix and payload).
    #[error("truncated frame ({available} of {expected} bytes available)")]
    TruncatedFrame { expected: usize, available: usize },

    /// A buffer held more bytes than the single frame it should contain.
    #[error("{extra} trailing bytes after frame")]
    TrailingBytes { extra: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
