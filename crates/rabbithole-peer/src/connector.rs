use std::path::{Path, PathBuf};

use rabbithole_frame::{FrameConfig, FrameReader, FrameWriter, TagWidth, DEFAULT_MAX_PAYLOAD};
use rabbithole_transport::{IpcStream, UnixDomainSocket};
use tracing::{debug, warn};

use crate::error::Result;
use crate::handoff::{request_channel, Handoff, HandoffConfig};

/// An open connection to the rendezvous endpoint.
///
/// Only good for one provisioning exchange; [`Rendezvous::request_channel`]
/// consumes it and closes the socket whatever the outcome.
pub struct Rendezvous {
    path: PathBuf,
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
    config: HandoffConfig,
}

/// Connect to the rendezvous endpoint at `path`.
pub fn connect_rendezvous(path: impl AsRef<Path>, config: &HandoffConfig) -> Result<Rendezvous> {
    let path = path.as_ref().to_path_buf();
    let stream = UnixDomainSocket::connect(&path)?;
    let reader_stream = stream.try_clone()?;

    let reply_config = FrameConfig {
        tag_width: TagWidth::Untagged,
        max_payload_size: config.max_reply_payload,
        read_timeout: config.timeout,
        write_timeout: config.timeout,
    };
    let request_config = FrameConfig {
        max_payload_size: DEFAULT_MAX_PAYLOAD,
        ..reply_config.clone()
    };

    let reader = FrameReader::with_config_ipc(reader_stream, reply_config)?;
    let writer = FrameWriter::with_config_ipc(stream, request_config)?;

    Ok(Rendezvous {
        path,
        reader,
        writer,
        config: config.clone(),
    })
}

impl Rendezvous {
    /// Path of the rendezvous socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Another handle on the same socket, for shutting it down from elsewhere.
    pub(crate) fn try_clone_stream(&self) -> Result<IpcStream> {
        Ok(self.writer.get_ref().try_clone()?)
    }

    /// Request a dedicated channel, then close the rendezvous connection.
    pub fn request_channel(mut self) -> Result<Handoff> {
        let result = request_channel(&mut self.reader, &mut self.writer, &self.config);
        self.close();
        result
    }

    fn close(&mut self) {
        match self.writer.get_mut().shutdown() {
            Ok(()) => debug!(path = %self.path.display(), "closed rendezvous connection"),
            Err(err) => warn!(path = %self.path.display(), error = %err, "rendezvous shutdown failed"),
        }
    }
}

impl std::fmt::Debug for Rendezvous {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rendezvous")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;

    use rabbithole_frame::REQUEST;

    use super::*;
    use crate::error::PeerError;
    use crate::handoff::RABBITHOLE_REQUEST;

    fn make_dir(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/rbh-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn request_channel_closes_rendezvous() {
        let dir = make_dir("rv");
        let sock_path = dir.join("wonderland");
        let listener = UnixDomainSocket::bind(&sock_path).expect("rendezvous should bind");

        let server = thread::spawn(move || {
            let stream = listener.accept().expect("should accept");
            let reader_stream = stream.try_clone().expect("should clone");
            let mut reader = FrameReader::with_config(
                reader_stream,
                FrameConfig::with_tag_width(TagWidth::Word),
            );
            let mut writer = FrameWriter::new(stream);

            let request = reader.read_frame().expect("should read request");
            assert_eq!(request.tag, Some(REQUEST));
            assert_eq!(request.payload.as_ref(), RABBITHOLE_REQUEST);
            writer
                .send_untagged(b"/tmp/rabbithole-42")
                .expect("should reply");

            let err = reader.read_frame().expect_err("client should hang up");
            assert!(matches!(err, rabbithole_frame::FrameError::ConnectionClosed));
        });

        let rendezvous =
            connect_rendezvous(&sock_path, &HandoffConfig::default()).expect("should connect");
        assert_eq!(rendezvous.path(), sock_path.as_path());
        let handoff = rendezvous.request_channel().expect("handoff should succeed");
        assert_eq!(handoff.channel_path, PathBuf::from("/tmp/rabbithole-42"));

        server.join().expect("server thread should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_to_absent_rendezvous_fails() {
        let dir = make_dir("absent");
        let err = connect_rendezvous(dir.join("wonderland"), &HandoffConfig::default())
            .expect_err("nothing is listening");
        assert!(matches!(err, PeerError::Transport(_)));
        assert!(err.is_connection_error());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
