//! Client side of the rabbithole handoff.
//!
//! A client connects to the well-known rendezvous socket, asks for a
//! dedicated channel, is handed that channel's socket path, drops the
//! rendezvous connection and then talks to the channel until the server
//! hangs up. [`Session`] drives the whole sequence; the pieces it is built
//! from are public for callers that want to drive it by hand.

pub mod channel;
pub mod connector;
pub mod error;
pub mod event;
pub mod handoff;
pub mod session;

pub use channel::{Channel, ChannelConfig, READ_CHUNK_SIZE};
pub use connector::{connect_rendezvous, Rendezvous};
pub use error::{PeerError, Result};
pub use event::{BroadcastEvent, BCASTCHAT, CHAT_KIND, DEFAULT_CHAT_MESSAGE, EVENT_DELIMITER};
pub use handoff::{
    encode_handoff_reply, parse_handoff_reply, request_channel, validate_channel_path, Handoff,
    HandoffConfig, MAX_REPLY_PAYLOAD, RABBITHOLE_REQUEST,
};
pub use session::{
    BroadcastSummary, CloseReason, Session, SessionConfig, SessionState, StopHandle,
    DEFAULT_RENDEZVOUS_PATH,
};
