use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::tag::{Tag, TagWidth};

/// Size of the big-endian length prefix.
pub const LENGTH_SIZE: usize = 4;

/// Default maximum payload size accepted by readers and writers: 16 MiB.
///
/// The pure codec functions only enforce the `u32` ceiling of the length
/// prefix; this bound is applied by [`FrameReader`](crate::FrameReader) and
/// [`FrameWriter`](crate::FrameWriter) through [`FrameConfig`].
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One length-prefixed message.
///
/// The length is never stored: it is always `payload.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Tag preceding the length prefix, if any.
    pub tag: Option<Tag>,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a tagged frame.
    pub fn new(tag: Tag, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: Some(tag),
            payload: payload.into(),
        }
    }

    /// Create a frame with no tag.
    pub fn untagged(payload: impl Into<Bytes>) -> Self {
        Self {
            tag: None,
            payload: payload.into(),
        }
    }

    /// The caller-defined kind carried by the tag.
    pub fn kind(&self) -> Option<u32> {
        self.tag.map(Tag::value)
    }

    /// Tag width this frame is encoded with.
    pub fn tag_width(&self) -> TagWidth {
        self.tag.map(Tag::width).unwrap_or_default()
    }

    /// The total wire size of this frame (tag + length + payload).
    pub fn wire_size(&self) -> usize {
        self.tag_width().header_size() + self.payload.len()
    }

    /// Encode this frame into freshly allocated wire bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.tag, &self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────┬──────────────────┐
/// │ Tag (0, 1 or 4B) │ Length       │ Payload          │
/// │ BE when 4 bytes  │ (4B BE)      │ (Length bytes)   │
/// └──────────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(tag: Option<Tag>, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let width = tag.map(Tag::width).unwrap_or_default();
    dst.reserve(width.header_size() + payload.len());
    if let Some(tag) = tag {
        tag.put(dst);
    }
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer that may hold a partial frame.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(
    src: &mut BytesMut,
    width: TagWidth,
    max_payload: usize,
) -> Result<Option<Frame>> {
    let header = width.header_size();
    if src.len() < header {
        return Ok(None);
    }

    let (tag, payload_len) = read_header(&src[..header], width);
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < header + payload_len {
        return Ok(None);
    }

    src.advance(header);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { tag, payload }))
}

/// Decode a buffer that must hold exactly one frame.
///
/// Short input is [`FrameError::TruncatedFrame`], surplus input is
/// [`FrameError::TrailingBytes`].
pub fn decode_exact(src: &[u8], width: TagWidth) -> Result<Frame> {
    let header = width.header_size();
    if src.len() < header {
        return Err(FrameError::TruncatedFrame {
            expected: header,
            available: src.len(),
        });
    }

    let (tag, payload_len) = read_header(&src[..header], width);
    let total = header.saturating_add(payload_len);
    if src.len() < total {
        return Err(FrameError::TruncatedFrame {
            expected: total,
            available: src.len(),
        });
    }
    if src.len() > total {
        return Err(FrameError::TrailingBytes {
            extra: src.len() - total,
        });
    }

    Ok(Frame {
        tag,
        payload: Bytes::copy_from_slice(&src[header..]),
    })
}

/// Total wire size declared by the header at the start of `src`, if the
/// header is complete.
pub fn declared_frame_len(src: &[u8], width: TagWidth) -> Option<usize> {
    let header = width.header_size();
    if src.len() < header {
        return None;
    }
    let (_, payload_len) = read_header(&src[..header], width);
    Some(header.saturating_add(payload_len))
}

fn read_header(mut header: &[u8], width: TagWidth) -> (Option<Tag>, usize) {
    let tag = match width {
        TagWidth::Untagged => None,
        TagWidth::Byte => Some(Tag::Byte(header.get_u8())),
        TagWidth::Word => Some(Tag::Word(header.get_u32())),
    };
    (tag, header.get_u32() as usize)
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Tag width expected on decode. Default: untagged.
    pub tag_width: TagWidth,
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations. Default: block forever.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations. Default: block forever.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// Default configuration decoding frames of the given tag width.
    pub fn with_tag_width(tag_width: TagWidth) -> Self {
        Self {
            tag_width,
            ..Self::default()
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            tag_width: TagWidth::Untagged,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{EVENT, REQUEST};

    #[test]
    fn rabbithole_request_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(Some(REQUEST), b"RABBITHOLE", &mut buf).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[
                0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0A, 0x52, 0x41, 0x42, 0x42, 0x49, 0x54,
                0x48, 0x4F, 0x4C, 0x45
            ]
        );
    }

    #[test]
    fn byte_tag_layout() {
        let frame = Frame::new(EVENT, Bytes::from_static(b"hi"));
        let wire = frame.to_bytes().unwrap();
        assert_eq!(wire.as_ref(), &[b'V', 0, 0, 0, 2, b'h', b'i']);
        assert_eq!(frame.wire_size(), wire.len());
    }

    #[test]
    fn untagged_layout() {
        let wire = Frame::untagged("/tmp/socketpath").to_bytes().unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 15]);
        assert_eq!(&wire[4..], b"/tmp/socketpath");
    }

    #[test]
    fn encode_decode_each_width() {
        let cases = [
            (Some(Tag::Word(0xDEAD_BEEF)), TagWidth::Word),
            (Some(Tag::Byte(0x7F)), TagWidth::Byte),
            (None, TagWidth::Untagged),
        ];

        for (tag, width) in cases {
            let mut buf = BytesMut::new();
            encode_frame(tag, b"payload", &mut buf).unwrap();

            let frame = decode_frame(&mut buf, width, DEFAULT_MAX_PAYLOAD)
                .unwrap()
                .unwrap();
            assert_eq!(frame.tag, tag);
            assert_eq!(frame.payload.as_ref(), b"payload");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(Some(REQUEST), b"", &mut buf).unwrap();
        assert_eq!(buf.len(), 8);

        let frame = decode_frame(&mut buf, TagWidth::Word, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind(), Some(1));
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn declared_length_matches_payload() {
        let payload = vec![0x42u8; 300];
        let mut buf = BytesMut::new();
        encode_frame(Some(EVENT), &payload, &mut buf).unwrap();

        let declared = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        let frame = decode_frame(&mut buf, TagWidth::Byte, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.len(), declared);
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x01, 0x00][..]);
        let result = decode_frame(&mut buf, TagWidth::Word, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 5, "partial header must not be consumed");
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(Some(REQUEST), b"RABBITHOLE", &mut buf).unwrap();
        buf.truncate(10);

        let result = decode_frame(&mut buf, TagWidth::Word, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(b'V');
        buf.put_u32(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, TagWidth::Byte, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(Some(EVENT), b"first", &mut buf).unwrap();
        encode_frame(Some(EVENT), b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, TagWidth::Byte, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut buf, TagWidth::Byte, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(f1.payload.as_ref(), b"first");
        assert_eq!(f2.payload.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_exact_whole_frame() {
        let wire = Frame::new(REQUEST, "RABBITHOLE").to_bytes().unwrap();
        let frame = decode_exact(&wire, TagWidth::Word).unwrap();
        assert_eq!(frame, Frame::new(REQUEST, "RABBITHOLE"));
    }

    #[test]
    fn decode_exact_short_header() {
        let err = decode_exact(&[0x00, 0x00], TagWidth::Untagged).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedFrame {
                expected: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn decode_exact_short_payload() {
        let mut wire = BytesMut::new();
        wire.put_u32(20);
        wire.put_slice(b"/tmp/short");

        let err = decode_exact(&wire, TagWidth::Untagged).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedFrame {
                expected: 24,
                available: 14
            }
        ));
    }

    #[test]
    fn decode_exact_trailing_bytes() {
        let mut wire = BytesMut::new();
        wire.put_u32(2);
        wire.put_slice(b"okextra");

        let err = decode_exact(&wire, TagWidth::Untagged).unwrap_err();
        assert!(matches!(err, FrameError::TrailingBytes { extra: 5 }));
    }

    #[test]
    fn declared_frame_len_needs_full_header() {
        assert_eq!(declared_frame_len(&[b'V', 0, 0], TagWidth::Byte), None);
        assert_eq!(declared_frame_len(&[b'V', 0, 0, 0, 9], TagWidth::Byte), Some(14));
    }
}
