//! Big-endian length-prefixed framing for the rabbithole handoff protocol.
//!
//! Every message on the wire is:
//! - an optional tag (none, one literal byte, or a 4-byte big-endian word)
//! - a 4-byte big-endian payload length
//! - the payload itself
//!
//! The wire carries no marker for the tag width, so both ends agree on it per
//! exchange: provisioning requests use a word tag, channel events a byte tag,
//! and the rendezvous reply is untagged.

pub mod codec;
#[cfg(feature = "async")]
pub mod codec_async;
pub mod error;
pub mod reader;
pub mod tag;
pub mod writer;

pub use codec::{
    decode_exact, decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    LENGTH_SIZE,
};
#[cfg(feature = "async")]
pub use codec_async::RabbitholeCodec;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use tag::{tag_name, Tag, TagWidth, EVENT, REQUEST};
pub use writer::FrameWriter;
