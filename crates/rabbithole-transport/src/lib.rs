//! Unix domain socket transport for the rabbithole handoff protocol.
//!
//! Both the rendezvous endpoint and the dedicated channel it hands out are
//! filesystem-path Unix domain sockets. This crate owns connecting to them
//! (and binding them, for local fixtures) and exposes the connected socket as
//! an [`IpcStream`] that the framing layer reads and writes.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
