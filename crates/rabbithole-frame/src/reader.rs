use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use rabbithole_transport::IpcStream;

use crate::codec::{declared_frame_len, decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// The tag width to expect comes from [`FrameConfig::tag_width`].
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader for untagged frames.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// EOF between frames is [`FrameError::ConnectionClosed`]. EOF inside a
    /// frame is [`FrameError::TruncatedFrame`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(
                &mut self.buf,
                self.config.tag_width,
                self.config.max_payload_size,
            )? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(self.eof_error());
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn eof_error(&self) -> FrameError {
        if self.buf.is_empty() {
            return FrameError::ConnectionClosed;
        }
        let expected = declared_frame_len(&self.buf, self.config.tag_width)
            .unwrap_or_else(|| self.config.tag_width.header_size());
        tracing::debug!(
            expected,
            available = self.buf.len(),
            "stream ended inside a frame"
        );
        FrameError::TruncatedFrame {
            expected,
            available: self.buf.len(),
        }
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: rabbithole_transport::TransportError) -> FrameError {
    use rabbithole_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::tag::{Tag, TagWidth, EVENT, REQUEST};

    fn word_reader<R: Read>(inner: R) -> FrameReader<R> {
        FrameReader::with_config(inner, FrameConfig::with_tag_width(TagWidth::Word))
    }

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(Some(REQUEST), b"RABBITHOLE", &mut wire).unwrap();

        let mut reader = word_reader(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.tag, Some(REQUEST));
        assert_eq!(frame.payload.as_ref(), b"RABBITHOLE");
    }

    #[test]
    fn read_untagged_reply() {
        let mut wire = BytesMut::new();
        encode_frame(None, b"/tmp/socketpath", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.tag, None);
        assert_eq!(frame.payload.as_ref(), b"/tmp/socketpath");
    }

    #[test]
    fn read_multiple_event_frames() {
        let mut wire = BytesMut::new();
        encode_frame(Some(EVENT), b"one", &mut wire).unwrap();
        encode_frame(Some(EVENT), b"two", &mut wire).unwrap();
        encode_frame(Some(Tag::Byte(b'X')), b"three", &mut wire).unwrap();

        let mut reader = FrameReader::with_config(
            Cursor::new(wire.to_vec()),
            FrameConfig::with_tag_width(TagWidth::Byte),
        );

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!(f2.payload.as_ref(), b"two");
        assert_eq!(f3.tag, Some(Tag::Byte(b'X')));
        assert_eq!(f3.payload.as_ref(), b"three");
    }

    #[test]
    fn read_frame_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut wire = BytesMut::new();
        encode_frame(None, &payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(Some(REQUEST), b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = word_reader(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.kind(), Some(1));
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn truncated_payload_fails_closed() {
        let mut partial = BytesMut::new();
        partial.put_u32(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedFrame {
                expected: 20,
                available: 13
            }
        ));
    }

    #[test]
    fn truncated_header_fails_closed() {
        let mut reader = word_reader(Cursor::new(vec![0x00, 0x00, 0x00, 0x01, 0x00]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedFrame {
                expected: 8,
                available: 5
            }
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u32(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = word_reader(right);

        writer.send(REQUEST, b"RABBITHOLE").unwrap();
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.tag, Some(REQUEST));
        assert_eq!(frame.payload.as_ref(), b"RABBITHOLE");
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(Some(EVENT), b"ok", &mut wire).unwrap();

        let reader = InterruptedThenData {
            interrupted: false,
            data: Cursor::new(wire.to_vec()),
        };
        let mut framed =
            FrameReader::with_config(reader, FrameConfig::with_tag_width(TagWidth::Byte));
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.tag, Some(EVENT));
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    struct InterruptedThenData {
        interrupted: bool,
        data: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = FrameReader::new(WouldBlock);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct WouldBlock;

    impl Read for WouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_ipc_stream_uds() {
        let dir = std::env::temp_dir().join(format!(
            "rabbithole-frame-uds-roundtrip-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("wonderland.sock");
        let listener = rabbithole_transport::UnixDomainSocket::bind(&sock_path).unwrap();

        let server = std::thread::spawn(move || {
            let stream = listener.accept().unwrap();
            let cfg = FrameConfig {
                tag_width: TagWidth::Word,
                read_timeout: Some(std::time::Duration::from_secs(5)),
                ..FrameConfig::default()
            };
            let mut reader = FrameReader::with_config_ipc(stream, cfg).unwrap();
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.tag, Some(REQUEST));
            assert_eq!(frame.payload.as_ref(), b"RABBITHOLE");
        });

        let stream = rabbithole_transport::UnixDomainSocket::connect(&sock_path).unwrap();
        let mut writer = crate::writer::FrameWriter::new(stream);
        writer.send(REQUEST, b"RABBITHOLE").unwrap();

        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
