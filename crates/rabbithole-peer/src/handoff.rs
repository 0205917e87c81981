use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use rabbithole_frame::{
    decode_exact, Frame, FrameError, FrameReader, FrameWriter, Tag, TagWidth, REQUEST,
};
use rabbithole_transport::UnixDomainSocket;
use tracing::{debug, info};

use crate::error::{PeerError, Result};

/// Payload of the provisioning request.
pub const RABBITHOLE_REQUEST: &[u8] = b"RABBITHOLE";

/// Largest reply payload accepted by default.
///
/// The rendezvous reply has always fit in a single 1024-byte read, length
/// prefix included.
pub const MAX_REPLY_PAYLOAD: usize = 1024 - rabbithole_frame::LENGTH_SIZE;

/// Settings for the provisioning exchange with the rendezvous endpoint.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// Tag of the request frame.
    pub request_tag: Tag,
    /// Payload of the request frame.
    pub request_payload: Bytes,
    /// Upper bound on the reply payload.
    pub max_reply_payload: usize,
    /// Socket read/write timeout. `None` blocks until the peer answers.
    pub timeout: Option<Duration>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            request_tag: REQUEST,
            request_payload: Bytes::from_static(RABBITHOLE_REQUEST),
            max_reply_payload: MAX_REPLY_PAYLOAD,
            timeout: None,
        }
    }
}

/// Outcome of a successful provisioning exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Filesystem path of the dedicated channel socket.
    pub channel_path: PathBuf,
}

/// Send the provisioning request and wait for the handoff reply.
///
/// The reply is an untagged frame whose payload is the channel socket path.
/// `reader` is expected to be configured for [`TagWidth::Untagged`].
pub fn request_channel<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandoffConfig,
) -> Result<Handoff> {
    writer.send(config.request_tag, &config.request_payload)?;
    debug!(
        tag = %config.request_tag,
        size = config.request_payload.len(),
        "sent provisioning request"
    );

    let reply = match reader.read_frame() {
        Ok(frame) => frame,
        Err(FrameError::ConnectionClosed) => {
            return Err(PeerError::Disconnected(
                "rendezvous closed before replying".to_string(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    // The declared length must account for every byte the endpoint sent.
    let extra = reader.buffered();
    if extra > 0 {
        return Err(FrameError::TrailingBytes { extra }.into());
    }

    let channel_path = validate_channel_path(&reply.payload)?;
    info!(path = %channel_path.display(), "received rabbithole");
    Ok(Handoff { channel_path })
}

/// Parse a complete rendezvous reply: a 4-byte big-endian sub-length
/// followed by exactly that many bytes of socket path.
pub fn parse_handoff_reply(reply: &[u8]) -> Result<Handoff> {
    let frame = decode_exact(reply, TagWidth::Untagged)?;
    let channel_path = validate_channel_path(&frame.payload)?;
    Ok(Handoff { channel_path })
}

/// Encode the reply a rendezvous endpoint sends for `channel_path`.
pub fn encode_handoff_reply(channel_path: &Path) -> Result<Bytes> {
    let text = channel_path.to_str().ok_or_else(|| {
        PeerError::MalformedHandoff("socket path is not valid UTF-8".to_string())
    })?;
    validate_channel_path(text.as_bytes())?;
    Ok(Frame::untagged(Bytes::copy_from_slice(text.as_bytes())).to_bytes()?)
}

/// Check that raw reply bytes name a socket path we can connect to.
///
/// The path must be non-empty, printable ASCII (space allowed, NUL and
/// every other control or whitespace character rejected) and short enough
/// for `sockaddr_un`.
pub fn validate_channel_path(raw: &[u8]) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(PeerError::MalformedHandoff("empty socket path".to_string()));
    }

    let text = std::str::from_utf8(raw).map_err(|_| {
        PeerError::MalformedHandoff("socket path is not valid UTF-8".to_string())
    })?;

    if let Some((pos, c)) = text
        .char_indices()
        .find(|&(_, c)| c != ' ' && !c.is_ascii_graphic())
    {
        return Err(PeerError::MalformedHandoff(format!(
            "socket path contains unprintable character {c:?} at byte {pos}"
        )));
    }

    if raw.len() >= UnixDomainSocket::MAX_PATH_LEN {
        return Err(PeerError::MalformedHandoff(format!(
            "socket path too long ({} bytes, max {})",
            raw.len(),
            UnixDomainSocket::MAX_PATH_LEN - 1
        )));
    }

    Ok(PathBuf::from(text))
}
