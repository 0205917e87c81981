use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rabbithole_frame::EVENT;
use rabbithole_transport::IpcStream;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelConfig};
use crate::connector::{connect_rendezvous, Rendezvous};
use crate::error::{PeerError, Result};
use crate::event::BroadcastEvent;
use crate::handoff::{Handoff, HandoffConfig};

/// Well-known rendezvous socket.
pub const DEFAULT_RENDEZVOUS_PATH: &str = "/tmp/wonderland";

/// Where a [`Session`] is in the handoff.
///
/// `Disconnected → ConnectedToRendezvous → RedirectedToChannel → Closed`.
/// Any failure also lands in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    ConnectedToRendezvous,
    RedirectedToChannel,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::ConnectedToRendezvous => "connected-to-rendezvous",
            SessionState::RedirectedToChannel => "redirected-to-channel",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the broadcast loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The channel peer closed the connection.
    PeerClosed,
    /// `max_events` events were sent.
    EventLimit,
    /// The caller raised the [`StopHandle`].
    Stopped,
}

/// Ends a [`Session`] from another thread, such as a signal handler.
///
/// Raising it also shuts down the socket the session is using, so a read or
/// write that is blocked on a silent peer returns at once.
#[derive(Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    active: Mutex<Option<IpcStream>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and shut down the session's current socket. Idempotent.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let mut active = self.active();
        if let Some(stream) = active.take() {
            shutdown_watched(stream);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Track the socket the session now blocks on. A handle that was already
    /// raised shuts it down straight away.
    pub(crate) fn watch(&self, stream: Option<IpcStream>) {
        let mut active = self.active();
        *active = stream;
        if self.is_stopped() {
            if let Some(stream) = active.take() {
                shutdown_watched(stream);
            }
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<IpcStream>> {
        // The guarded value is only ever swapped, so a poisoned lock is still usable.
        self.inner
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn shutdown_watched(mut stream: IpcStream) {
    match stream.shutdown() {
        Ok(()) => debug!("stop requested, socket shut down"),
        Err(err) => warn!(error = %err, "socket shutdown on stop failed"),
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Counters from a finished broadcast loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub chunks_received: usize,
    pub bytes_received: usize,
    pub events_sent: usize,
    pub reason: CloseReason,
}

/// Everything a [`Session`] needs to run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rendezvous_path: PathBuf,
    pub handoff: HandoffConfig,
    pub channel: ChannelConfig,
    /// Stop after this many events. `None` runs until the peer hangs up.
    pub max_events: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rendezvous_path: PathBuf::from(DEFAULT_RENDEZVOUS_PATH),
            handoff: HandoffConfig::default(),
            channel: ChannelConfig::default(),
            max_events: None,
        }
    }
}

/// Drives one client through the rendezvous handoff and the channel loop.
///
/// Sockets are released on every path out: explicit [`Session::close`], any
/// error, or drop.
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    rendezvous: Option<Rendezvous>,
    channel: Option<Channel>,
    handoff: Option<Handoff>,
    stop: StopHandle,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            rendezvous: None,
            channel: None,
            handoff: None,
            stop: StopHandle::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A handle that stops this session from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The handoff received from the rendezvous endpoint, once redirected.
    pub fn handoff(&self) -> Option<&Handoff> {
        self.handoff.as_ref()
    }

    /// Connect to the rendezvous endpoint.
    pub fn connect(&mut self) -> Result<()> {
        self.require(SessionState::Disconnected)?;

        match connect_rendezvous(&self.config.rendezvous_path, &self.config.handoff) {
            Ok(rendezvous) => {
                match rendezvous.try_clone_stream() {
                    Ok(stream) => self.stop.watch(Some(stream)),
                    Err(err) => return Err(self.fail(err)),
                }
                info!(
                    path = %self.config.rendezvous_path.display(),
                    "connected to rendezvous, requesting rabbithole"
                );
                self.rendezvous = Some(rendezvous);
                self.state = SessionState::ConnectedToRendezvous;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Request a channel, drop the rendezvous connection and connect to the
    /// channel it named.
    pub fn redirect(&mut self) -> Result<&Handoff> {
        self.require(SessionState::ConnectedToRendezvous)?;
        let Some(rendezvous) = self.rendezvous.take() else {
            return Err(self.fail(PeerError::InvalidState {
                expected: SessionState::ConnectedToRendezvous,
                actual: self.state,
            }));
        };

        let handoff = match rendezvous.request_channel() {
            Ok(handoff) => handoff,
            Err(err) => return Err(self.fail(err)),
        };

        info!(path = %handoff.channel_path.display(), "connecting to rabbithole");
        match Channel::connect(&handoff.channel_path, &self.config.channel) {
            Ok(channel) => {
                match channel.try_clone_stream() {
                    Ok(stream) => self.stop.watch(Some(stream)),
                    Err(err) => return Err(self.fail(err)),
                }
                info!(path = %handoff.channel_path.display(), "rabbithole connection successful");
                self.channel = Some(channel);
                self.state = SessionState::RedirectedToChannel;
                Ok(&*self.handoff.insert(handoff))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Answer every chunk the channel delivers with `event` until the peer
    /// hangs up, `max_events` is reached or the [`StopHandle`] is raised.
    ///
    /// `on_chunk` sees each inbound chunk before the event is sent. A socket
    /// failure after a stop request counts as a clean stop.
    pub fn broadcast_until_closed<F>(
        &mut self,
        event: &BroadcastEvent,
        mut on_chunk: F,
    ) -> Result<BroadcastSummary>
    where
        F: FnMut(&[u8]),
    {
        self.require(SessionState::RedirectedToChannel)?;

        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(err) => return Err(self.fail(err)),
        };
        debug!(name = %event.name, size = payload.len(), "broadcast event encoded");

        let mut summary = BroadcastSummary {
            chunks_received: 0,
            bytes_received: 0,
            events_sent: 0,
            reason: CloseReason::PeerClosed,
        };

        loop {
            if self.stop.is_stopped() {
                summary.reason = CloseReason::Stopped;
                break;
            }
            if self
                .config
                .max_events
                .is_some_and(|max| summary.events_sent >= max)
            {
                summary.reason = CloseReason::EventLimit;
                break;
            }

            let Some(channel) = self.channel.as_mut() else {
                return Err(self.fail(PeerError::Disconnected("channel already closed".to_string())));
            };

            let chunk = match channel.recv_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) if self.stop.is_stopped() => {
                    summary.reason = CloseReason::Stopped;
                    break;
                }
                Ok(None) => {
                    info!("rabbit hole disconnected");
                    summary.reason = CloseReason::PeerClosed;
                    break;
                }
                Err(_) if self.stop.is_stopped() => {
                    summary.reason = CloseReason::Stopped;
                    break;
                }
                Err(err) => return Err(self.fail(err)),
            };

            summary.chunks_received += 1;
            summary.bytes_received += chunk.len();
            on_chunk(&chunk[..]);

            match channel.send(EVENT, &payload) {
                Ok(()) => summary.events_sent += 1,
                Err(_) if self.stop.is_stopped() => {
                    summary.reason = CloseReason::Stopped;
                    break;
                }
                Err(err) => return Err(self.fail(err)),
            }
        }

        self.close();
        Ok(summary)
    }

    /// Connect, redirect and broadcast in one go.
    pub fn run<F>(
        &mut self,
        event: &BroadcastEvent,
        on_chunk: F,
    ) -> Result<BroadcastSummary>
    where
        F: FnMut(&[u8]),
    {
        self.connect()?;
        self.redirect()?;
        self.broadcast_until_closed(event, on_chunk)
    }

    /// Release every socket and move to `Closed`. Idempotent.
    pub fn close(&mut self) {
        self.stop.watch(None);
        // Dropping the rendezvous closes its descriptors.
        self.rendezvous = None;
        if let Some(mut channel) = self.channel.take() {
            if let Err(err) = channel.close() {
                warn!(error = %err, "channel shutdown failed");
            }
        }
        if self.state != SessionState::Closed {
            debug!(from = %self.state, "session closed");
            self.state = SessionState::Closed;
        }
    }

    fn require(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(PeerError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn fail(&mut self, err: PeerError) -> PeerError {
        warn!(state = %self.state, error = %err, "session failed");
        self.close();
        err
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("rendezvous_path", &self.config.rendezvous_path)
            .field("handoff", &self.handoff)
            .finish()
    }
}
