//! Frame tags.
//!
//! A tag identifies what a frame means to the receiver. Its meaning is
//! entirely caller-defined; the codec only cares about how wide it is.

use std::fmt;

use bytes::BufMut;

/// Provisioning request sent to the rendezvous endpoint.
pub const REQUEST: Tag = Tag::Word(1);

/// Broadcast event sent on a dedicated channel (`'V'`).
pub const EVENT: Tag = Tag::Byte(b'V');

/// A frame tag as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Four bytes, big-endian.
    Word(u32),
    /// One literal byte.
    Byte(u8),
}

impl Tag {
    /// The numeric kind carried by this tag.
    pub fn value(self) -> u32 {
        match self {
            Tag::Word(value) => value,
            Tag::Byte(value) => u32::from(value),
        }
    }

    /// The wire width of this tag.
    pub fn width(self) -> TagWidth {
        match self {
            Tag::Word(_) => TagWidth::Word,
            Tag::Byte(_) => TagWidth::Byte,
        }
    }

    pub(crate) fn put(self, dst: &mut impl BufMut) {
        match self {
            Tag::Word(value) => dst.put_u32(value),
            Tag::Byte(value) => dst.put_u8(value),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Word(value) => write!(f, "{value}"),
            Tag::Byte(value) if value.is_ascii_graphic() => write!(f, "'{}'", *value as char),
            Tag::Byte(value) => write!(f, "0x{value:02x}"),
        }
    }
}

/// How many tag bytes precede the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagWidth {
    /// No tag; the frame starts with its length.
    #[default]
    Untagged,
    /// A single byte tag.
    Byte,
    /// A 4-byte big-endian tag.
    Word,
}

impl TagWidth {
    /// Number of tag bytes on the wire.
    pub const fn len(self) -> usize {
        match self {
            TagWidth::Untagged => 0,
            TagWidth::Byte => 1,
            TagWidth::Word => 4,
        }
    }

    /// Whether frames of this width carry no tag.
    pub const fn is_empty(self) -> bool {
        matches!(self, TagWidth::Untagged)
    }

    /// Tag plus length prefix.
    pub const fn header_size(self) -> usize {
        self.len() + crate::codec::LENGTH_SIZE
    }
}

/// Returns a human-readable name for a tag.
pub fn tag_name(tag: Option<Tag>) -> &'static str {
    match tag {
        None => "UNTAGGED",
        Some(REQUEST) => "REQUEST",
        Some(EVENT) => "EVENT",
        Some(_) => "USER",
    }
}
