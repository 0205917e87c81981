//! Client for the rabbithole rendezvous handoff.
//!
//! A client connects to a well-known Unix socket, asks for a dedicated
//! channel with a `RABBITHOLE` request, is handed the channel's socket path
//! and then answers the channel with broadcast events until it closes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket connect/bind and stream handling
//! - [`frame`]: tag + big-endian length-prefixed framing
//! - [`peer`]: the handoff itself and the channel session

/// Re-export transport types.
pub mod transport {
    pub use rabbithole_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rabbithole_frame::*;
}

/// Re-export handoff and session types.
pub mod peer {
    pub use rabbithole_peer::*;
}
