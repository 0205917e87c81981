//! `tokio_util` codec for async streams.
//!
//! Same wire format and failure modes as the blocking reader and writer.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{declared_frame_len, decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;
use crate::tag::TagWidth;

/// Frame codec for `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone)]
pub struct RabbitholeCodec {
    tag_width: TagWidth,
    max_payload_size: usize,
}

impl RabbitholeCodec {
    /// Codec decoding frames with the given tag width.
    pub fn new(tag_width: TagWidth) -> Self {
        Self {
            tag_width,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Override the maximum accepted payload size.
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }
}

impl Decoder for RabbitholeCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.tag_width, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let expected = declared_frame_len(src, self.tag_width)
            .unwrap_or_else(|| self.tag_width.header_size());
        Err(FrameError::TruncatedFrame {
            expected,
            available: src.len(),
        })
    }
}

impl Encoder<Frame> for RabbitholeCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if frame.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(frame.tag, &frame.payload, dst)
    }
}
