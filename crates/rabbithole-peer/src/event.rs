//! Broadcast event payloads carried in `'V'` frames.
//!
//! ```text
//! u32 BE name len │ name │ 0x01 │ kind │ u32 BE body len │ body
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rabbithole_frame::{decode_frame, encode_frame, Frame, TagWidth, EVENT, LENGTH_SIZE};

use crate::error::{PeerError, Result};

/// Event name for a broadcast chat line.
pub const BCASTCHAT: &str = "BCASTCHAT";

/// Separates the event name from its arguments.
pub const EVENT_DELIMITER: u8 = 0x01;

/// Argument kind for chat text.
pub const CHAT_KIND: u8 = 0x03;

/// Chat line sent when no other message is given.
pub const DEFAULT_CHAT_MESSAGE: &str = "Alice: Who...are...you?";

/// A named event broadcast to every client of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub name: String,
    pub kind: u8,
    pub body: Bytes,
}

impl BroadcastEvent {
    pub fn new(name: impl Into<String>, kind: u8, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            kind,
            body: body.into(),
        }
    }

    /// A `BCASTCHAT` event carrying one line of chat.
    pub fn chat(message: impl Into<Bytes>) -> Self {
        Self::new(BCASTCHAT, CHAT_KIND, message)
    }

    /// Encode the event payload (without the `'V'` frame header).
    pub fn encode(&self) -> Result<Bytes> {
        if self.name.is_empty() {
            return Err(PeerError::MalformedEvent("event name is empty".to_string()));
        }

        let mut dst =
            BytesMut::with_capacity(2 * LENGTH_SIZE + 2 + self.name.len() + self.body.len());
        encode_frame(None, self.name.as_bytes(), &mut dst)?;
        dst.put_u8(EVENT_DELIMITER);
        dst.put_u8(self.kind);
        encode_frame(None, &self.body, &mut dst)?;
        Ok(dst.freeze())
    }

    /// The complete `'V'` frame for this event.
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(EVENT, self.encode()?))
    }

    /// Parse an event payload. Every byte must be accounted for.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut src = BytesMut::from(payload);

        let name = decode_frame(&mut src, TagWidth::Untagged, usize::MAX)?
            .ok_or_else(|| malformed("truncated event name"))?;
        let name = String::from_utf8(name.payload.to_vec())
            .map_err(|_| malformed("event name is not valid UTF-8"))?;
        if name.is_empty() {
            return Err(malformed("event name is empty"));
        }

        if src.len() < 2 {
            return Err(malformed("missing event delimiter"));
        }
        if src[0] != EVENT_DELIMITER {
            return Err(PeerError::MalformedEvent(format!(
                "expected delimiter 0x{EVENT_DELIMITER:02x}, found 0x{:02x}",
                src[0]
            )));
        }
        let kind = src[1];
        src.advance(2);

        let body = decode_frame(&mut src, TagWidth::Untagged, usize::MAX)?
            .ok_or_else(|| malformed("truncated event body"))?;

        if !src.is_empty() {
            return Err(PeerError::MalformedEvent(format!(
                "{} trailing bytes after event body",
                src.len()
            )));
        }

        Ok(Self {
            name,
            kind,
            body: body.payload,
        })
    }
}

impl Default for BroadcastEvent {
    fn default() -> Self {
        Self::chat(DEFAULT_CHAT_MESSAGE)
    }
}

fn malformed(reason: &str) -> PeerError {
    PeerError::MalformedEvent(reason.to_string())
}
