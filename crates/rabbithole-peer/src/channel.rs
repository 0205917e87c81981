use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use rabbithole_frame::{FrameConfig, FrameWriter, Tag, TagWidth, DEFAULT_MAX_PAYLOAD, EVENT};
use rabbithole_transport::{IpcStream, TransportError, UnixDomainSocket};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::event::BroadcastEvent;

/// Bytes requested per read on the channel.
pub const READ_CHUNK_SIZE: usize = 512;

/// Settings for the dedicated channel connection.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Upper bound for a single read.
    pub read_chunk_size: usize,
    /// Largest frame payload we will send.
    pub max_payload_size: usize,
    /// Socket read/write timeout. `None` blocks until the peer acts.
    pub timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: READ_CHUNK_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            timeout: None,
        }
    }
}

/// The dedicated socket handed out by the rendezvous endpoint.
///
/// Inbound traffic is not framed by this side; it is read as raw chunks and
/// only the zero-length read matters (peer closed). Outbound traffic is
/// byte-tagged frames.
pub struct Channel {
    path: PathBuf,
    reader: IpcStream,
    writer: FrameWriter<IpcStream>,
    buf: Vec<u8>,
}

impl Channel {
    /// Connect to the channel socket at `path`.
    pub fn connect(path: impl AsRef<Path>, config: &ChannelConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixDomainSocket::connect(&path)?;
        if let Some((uid, gid, pid)) = stream.peer_credentials() {
            debug!(path = %path.display(), uid, gid, pid, "channel peer credentials");
        }
        Self::from_stream(path, stream, config)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(path: PathBuf, stream: IpcStream, config: &ChannelConfig) -> Result<Self> {
        let reader = stream.try_clone()?;
        reader.set_read_timeout(config.timeout)?;

        let frame_config = FrameConfig {
            tag_width: TagWidth::Byte,
            max_payload_size: config.max_payload_size,
            read_timeout: config.timeout,
            write_timeout: config.timeout,
        };
        let writer = FrameWriter::with_config_ipc(stream, frame_config)?;

        Ok(Self {
            path,
            reader,
            writer,
            buf: vec![0u8; config.read_chunk_size.max(1)],
        })
    }

    /// Path of the channel socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever the peer has sent, up to one chunk (blocking).
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    pub fn recv_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    trace!(bytes = n, "channel chunk received");
                    return Ok(Some(Bytes::copy_from_slice(&self.buf[..n])));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err).into()),
            }
        }
    }

    /// Send one tagged frame.
    pub fn send(&mut self, tag: Tag, payload: &[u8]) -> Result<()> {
        self.writer.send(tag, payload)?;
        Ok(())
    }

    /// Send a broadcast event as a `'V'` frame.
    pub fn send_event(&mut self, event: &BroadcastEvent) -> Result<()> {
        let payload = event.encode()?;
        self.send(EVENT, &payload)
    }

    /// Another handle on the same socket, for shutting it down from elsewhere.
    pub(crate) fn try_clone_stream(&self) -> Result<IpcStream> {
        Ok(self.writer.get_ref().try_clone()?)
    }

    /// Shut down the connection. Dropping the channel also closes it.
    pub fn close(&mut self) -> Result<()> {
        self.writer.get_mut().shutdown()?;
        debug!(path = %self.path.display(), "closed channel");
        Ok(())
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path.display(), error = %err, "channel shutdown failed");
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("path", &self.path).finish()
    }
}
