//! Walk through the handoff one step at a time.
//!
//! Run with:
//!   cargo run --example handoff -- /tmp/wonderland
//!
//! Each chunk the channel sends is answered with the default chat event
//! until the server hangs up.

use std::path::PathBuf;

use rabbithole::peer::{BroadcastEvent, Session, SessionConfig, DEFAULT_RENDEZVOUS_PATH};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rendezvous_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDEZVOUS_PATH));

    let mut session = Session::new(SessionConfig {
        rendezvous_path,
        ..SessionConfig::default()
    });

    session.connect()?;
    eprintln!("Connected to {}", session.config().rendezvous_path.display());

    let handoff = session.redirect()?;
    eprintln!("Redirected to {}", handoff.channel_path.display());

    let summary = session.broadcast_until_closed(&BroadcastEvent::default(), |chunk| {
        eprintln!("Received {} bytes", chunk.len());
    })?;

    eprintln!(
        "Channel closed after {} events ({:?})",
        summary.events_sent, summary.reason
    );
    Ok(())
}
