//! Long-lived station sessions.
//!
//! After discovery a station opens a second WebSocket on its own endpoint and
//! keeps it for as long as it runs. [`run_session`] drives that connection
//! through the version handshake, delivers the router configuration, and
//! then dispatches every inbound frame to the [`NetworkServer`] until the
//! peer closes, the transport fails, or the caller cancels.
//!
//! A [`StationSession`] is the cloneable handle to one such connection. It
//! exposes the station's identity and announcements, live statistics, the
//! current [`SessionState`], and the outbound write path.

mod state;
mod stats;
mod writer;

use std::{
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
pub use state::SessionState;
pub use stats::{SessionStats, StatsSnapshot};
use thiserror::Error;
use tokio::{
    select,
    sync::{mpsc, oneshot, watch},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use writer::{Outbound, close_sink, run_writer};

use crate::{
    codec::{self, CodecError},
    eui::{Eui, EuiError},
    hooks::{HandlerError, NetworkServer},
    message::{Message, MessageKind, RouterConfig, Version},
    metrics::{self, Direction},
    transport::{Inbound, Transport, WsError, WsMessage, next_inbound},
};

/// Deadline for the version announcement after a session starts.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of outbound frames that may be queued per session.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

/// Tunables for station sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the version announcement.
    pub version_timeout: Duration,
    /// Capacity of the outbound queue. Writers wait when it is full.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version_timeout: VERSION_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] WsError),
    /// The station sent nothing usable before the version deadline.
    #[error("no version message within {0:?}")]
    VersionTimeout(Duration),
    /// The first frame was not valid protocol JSON.
    #[error("version message failed to decode: {0}")]
    Decode(#[source] CodecError),
    /// The first message was not a version announcement.
    #[error("expected version message, got {0}")]
    UnexpectedMessage(MessageKind),
    /// The first frame was binary.
    #[error("expected version message, got a binary frame")]
    UnexpectedFrame,
    /// The station went away before the handshake completed.
    #[error("connection closed during handshake")]
    ConnectionClosed,
    /// The network server could not supply a router configuration.
    #[error("router configuration unavailable: {0}")]
    RouterConfig(#[source] HandlerError),
    /// The router configuration could not be serialized.
    #[error("router configuration failed to encode: {0}")]
    Encode(#[source] CodecError),
    /// A server-initiated write failed and the connection was dropped.
    #[error("outbound write failed")]
    WriteFailed,
    /// The session endpoint did not name a valid station.
    #[error("invalid station identifier: {0}")]
    Identifier(#[from] EuiError),
    /// The handle has already driven a connection.
    #[error("session already started: state={0}")]
    AlreadyStarted(SessionState),
}

impl SessionError {
    /// Category of the failure: `transport`, `decode`, `protocol` or
    /// `identifier`.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::ConnectionClosed | Self::WriteFailed => "transport",
            Self::Decode(_) => "decode",
            Self::VersionTimeout(_)
            | Self::UnexpectedMessage(_)
            | Self::UnexpectedFrame
            | Self::RouterConfig(_)
            | Self::Encode(_)
            | Self::AlreadyStarted(_) => "protocol",
            Self::Identifier(_) => "identifier",
        }
    }
}

/// Errors returned by the session write path.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The session has no open connection to write to.
    #[error("no connection")]
    NoConnection,
    /// The connection rejected the frame.
    #[error("write failed: {0}")]
    Transport(#[source] WsError),
    /// The message could not be serialized.
    #[error(transparent)]
    Encode(#[from] CodecError),
}

/// Why a session ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The station sent a close frame.
    PeerClosed,
    /// The connection ended without a close frame.
    Disconnected,
    /// The caller's cancellation token fired.
    Cancelled,
}

/// Cloneable handle to one station connection.
#[derive(Clone, Debug)]
pub struct StationSession {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    eui: Eui,
    version: OnceLock<Version>,
    router_config: OnceLock<RouterConfig>,
    stats: Arc<SessionStats>,
    state: watch::Sender<SessionState>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
}

impl StationSession {
    /// Create a handle for `eui` that is not yet bound to a connection.
    ///
    /// Pass it to [`run_session`] to drive a connection. Until then every
    /// write fails with [`WriteError::NoConnection`]. A handle drives at most
    /// one connection.
    #[must_use]
    pub fn new(eui: Eui) -> Self {
        let (state, _) = watch::channel(SessionState::Connected);
        Self {
            inner: Arc::new(Inner {
                eui,
                version: OnceLock::new(),
                router_config: OnceLock::new(),
                stats: Arc::default(),
                state,
                outbound: Mutex::new(None),
            }),
        }
    }

    /// Identifier of the station.
    #[must_use]
    pub fn eui(&self) -> Eui { self.inner.eui }

    /// Version announced by the station, once received.
    #[must_use]
    pub fn version(&self) -> Option<&Version> { self.inner.version.get() }

    /// Router configuration delivered to the station, once sent.
    #[must_use]
    pub fn router_config(&self) -> Option<&RouterConfig> { self.inner.router_config.get() }

    /// Snapshot of the session's statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot { self.inner.stats.snapshot() }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { *self.inner.state.borrow() }

    /// Subscribe to lifecycle transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> { self.inner.state.subscribe() }

    /// Returns `true` while outbound writes can reach the station.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.outbound().is_some_and(|tx| !tx.is_closed()) }

    /// Encode `message` and write it to the station.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Encode`] if serialization fails,
    /// [`WriteError::NoConnection`] if the session is not active, or
    /// [`WriteError::Transport`] if the write itself fails.
    pub async fn send(&self, message: &Message) -> Result<(), WriteError> {
        let frame = match codec::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                self.inner.stats.record_write_err();
                return Err(e.into());
            }
        };
        self.enqueue(frame, message.kind().as_str()).await
    }

    /// Write a raw text frame to the station.
    ///
    /// Resolves once the frame has been handed to the transport. Frames are
    /// written in the order their writes were queued.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::NoConnection`] if the session is not active, or
    /// [`WriteError::Transport`] if the write fails.
    pub async fn write_text(&self, text: impl Into<String>) -> Result<(), WriteError> {
        self.enqueue(text.into(), "text").await
    }

    async fn enqueue(&self, frame: String, kind: &'static str) -> Result<(), WriteError> {
        let Some(tx) = self.outbound() else {
            return Err(self.no_connection());
        };
        let Ok(permit) = tx.reserve_owned().await else {
            return Err(self.no_connection());
        };
        let (ack, result) = oneshot::channel();
        permit.send(Outbound { frame, kind, ack });
        // Once queued, the writer counts the frame.
        match result.await {
            Ok(outcome) => outcome,
            // The writer task died without draining its queue.
            Err(_) => Err(self.no_connection()),
        }
    }

    fn no_connection(&self) -> WriteError {
        self.inner.stats.record_write_no_conn();
        debug!("write without connection: eui={}", self.inner.eui);
        WriteError::NoConnection
    }

    fn outbound_slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<Outbound>>> {
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn outbound(&self) -> Option<mpsc::Sender<Outbound>> { self.outbound_slot().clone() }

    fn bind_outbound(&self, tx: mpsc::Sender<Outbound>) { *self.outbound_slot() = Some(tx); }

    fn unbind_outbound(&self) { self.outbound_slot().take(); }

    /// Move a fresh handle into [`SessionState::AwaitVersion`].
    fn claim(&self) -> Result<(), SessionError> {
        let mut found = SessionState::Connected;
        let claimed = self.inner.state.send_if_modified(|state| {
            found = *state;
            let fresh = *state == SessionState::Connected;
            if fresh {
                *state = SessionState::AwaitVersion;
            }
            fresh
        });
        if claimed {
            debug!(
                "session state changed: eui={}, state={}",
                self.inner.eui,
                SessionState::AwaitVersion
            );
            Ok(())
        } else {
            Err(SessionError::AlreadyStarted(found))
        }
    }

    fn set_state(&self, state: SessionState) {
        self.inner.state.send_replace(state);
        debug!("session state changed: eui={}, state={state}", self.inner.eui);
    }

    /// Decode one text frame and hand it to `server`.
    fn dispatch_text<S>(&self, text: &str, server: &S)
    where
        S: NetworkServer + ?Sized,
    {
        let stats = &self.inner.stats;
        let eui = self.inner.eui;
        stats.record_text();
        match codec::decode(text.as_bytes()) {
            Ok(Some(message)) => {
                let kind = message.kind();
                stats.record_kind(kind);
                metrics::inc_frames(Direction::Inbound, kind.as_str());
                if kind.is_server_sent() {
                    warn!("server message from station ignored: eui={eui}, kind={kind}");
                } else {
                    server.receive(self, message);
                }
            }
            Ok(None) => {
                stats.record_kind(MessageKind::Proprietary);
                metrics::inc_frames(Direction::Inbound, MessageKind::Proprietary.as_str());
                debug!("proprietary frame ignored: eui={eui}");
            }
            Err(e) => {
                stats.record_decode_error();
                metrics::inc_decode_errors(e.error_type());
                error!(
                    "decode failed: eui={eui}, error={e}, error_type={}",
                    e.error_type()
                );
            }
        }
    }

    fn dispatch_binary(&self, len: usize) {
        self.inner.stats.record_binary();
        metrics::inc_frames(Direction::Inbound, "binary");
        debug!("binary frame skipped: eui={}, len={len}", self.inner.eui);
    }

    fn finish(&self, outcome: &Result<CloseReason, SessionError>) {
        let eui = self.inner.eui;
        match outcome {
            Ok(reason) => {
                self.set_state(SessionState::Closed);
                info!("session closed: eui={eui}, reason={reason:?}");
            }
            Err(e) => {
                self.set_state(SessionState::Error);
                error!(
                    "session failed: eui={eui}, error={e}, category={}",
                    e.category()
                );
            }
        }
    }
}

/// Tracks a live session in the active sessions gauge.
struct ActiveSession;

impl ActiveSession {
    fn new() -> Self {
        metrics::inc_sessions();
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) { metrics::dec_sessions(); }
}

enum Handshake {
    Complete,
    Cancelled,
}

/// Drive one station connection to completion.
///
/// The station must announce its version within
/// [`SessionConfig::version_timeout`]; the router configuration from
/// [`NetworkServer::router_config`] is then written as the first outbound
/// frame. Only after that write completes does the message loop start, so no
/// station traffic is dispatched before the station is configured.
///
/// Cancelling `cancel` ends the session promptly, even while a read is
/// pending. The connection is closed before this function returns.
///
/// `session` must be fresh: a handle that has already driven a connection is
/// refused and left untouched.
///
/// # Errors
///
/// Returns [`SessionError::AlreadyStarted`] for a reused handle, or another
/// [`SessionError`] when the handshake fails or the connection breaks.
/// Malformed frames after the handshake are counted and skipped and never
/// end the session.
pub async fn run_session<T, S>(
    transport: T,
    session: StationSession,
    server: Arc<S>,
    config: SessionConfig,
    cancel: CancellationToken,
) -> Result<CloseReason, SessionError>
where
    T: Transport,
    S: NetworkServer + ?Sized,
{
    let eui = session.eui();
    let (mut sink, mut stream) = transport.split();
    if let Err(e) = session.claim() {
        warn!("session refused: eui={eui}, error={e}");
        close_sink(&mut sink, eui).await;
        return Err(e);
    }
    let _active = ActiveSession::new();
    server.on_session_start(&session).await;

    let handshake = handshake(
        &mut sink,
        &mut stream,
        &session,
        server.as_ref(),
        &config,
        &cancel,
    )
    .await;
    let outcome = match handshake {
        Ok(Handshake::Complete) => {
            run_active(sink, stream, &session, server.as_ref(), &config, &cancel).await
        }
        Ok(Handshake::Cancelled) => {
            close_sink(&mut sink, eui).await;
            Ok(CloseReason::Cancelled)
        }
        Err(e) => {
            close_sink(&mut sink, eui).await;
            Err(e)
        }
    };

    session.finish(&outcome);
    server.on_session_end(&session, outcome.as_ref()).await;
    outcome
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn handshake<K, R, S>(
    sink: &mut K,
    stream: &mut R,
    session: &StationSession,
    server: &S,
    config: &SessionConfig,
    cancel: &CancellationToken,
) -> Result<Handshake, SessionError>
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    S: NetworkServer + ?Sized,
{
    let eui = session.eui();
    let version = select! {
        biased;

        () = cancel.cancelled() => return Ok(Handshake::Cancelled),
        read = timeout(config.version_timeout, read_version(stream, session)) => match read {
            Ok(version) => version?,
            Err(_) => return Err(SessionError::VersionTimeout(config.version_timeout)),
        },
    };
    info!(
        "version received: eui={eui}, station={}, firmware={}, model={}, protocol={}",
        version.station, version.firmware, version.model, version.protocol
    );
    session
        .inner
        .version
        .set(version.clone())
        .map_err(|_| SessionError::AlreadyStarted(session.state()))?;
    server.set_version(session, &version).await;
    session.set_state(SessionState::ConfigDelivered);

    let router_config = select! {
        biased;

        () = cancel.cancelled() => return Ok(Handshake::Cancelled),
        res = server.router_config(session) => res.map_err(SessionError::RouterConfig)?,
    };
    let frame = codec::encode(&Message::from(router_config.clone())).map_err(|e| {
        session.inner.stats.record_write_err();
        SessionError::Encode(e)
    })?;
    if let Err(e) = sink.send(WsMessage::Text(frame)).await {
        session.inner.stats.record_write_err();
        return Err(SessionError::Transport(e));
    }
    session.inner.stats.record_write_ok();
    metrics::inc_frames(Direction::Outbound, MessageKind::RouterConfig.as_str());
    debug!(
        "router configuration sent: eui={eui}, region={}",
        router_config.region
    );
    session
        .inner
        .router_config
        .set(router_config)
        .map_err(|_| SessionError::AlreadyStarted(session.state()))?;
    Ok(Handshake::Complete)
}

async fn read_version<R>(stream: &mut R, session: &StationSession) -> Result<Version, SessionError>
where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let stats = &session.inner.stats;
    match next_inbound(stream).await? {
        Inbound::Text(text) => {
            stats.record_text();
            match codec::decode(text.as_bytes()) {
                Ok(Some(Message::Version(version))) => {
                    stats.record_kind(MessageKind::Version);
                    metrics::inc_frames(Direction::Inbound, MessageKind::Version.as_str());
                    Ok(version)
                }
                Ok(Some(other)) => Err(SessionError::UnexpectedMessage(other.kind())),
                Ok(None) => Err(SessionError::UnexpectedMessage(MessageKind::Proprietary)),
                Err(e) => {
                    stats.record_decode_error();
                    metrics::inc_decode_errors(e.error_type());
                    Err(SessionError::Decode(e))
                }
            }
        }
        Inbound::Binary(_) => {
            stats.record_binary();
            Err(SessionError::UnexpectedFrame)
        }
        Inbound::Close | Inbound::End => Err(SessionError::ConnectionClosed),
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn run_active<K, R, S>(
    sink: K,
    mut stream: R,
    session: &StationSession,
    server: &S,
    config: &SessionConfig,
    cancel: &CancellationToken,
) -> Result<CloseReason, SessionError>
where
    K: Sink<WsMessage, Error = WsError> + Send + Unpin + 'static,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    S: NetworkServer + ?Sized,
{
    let eui = session.eui();
    let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
    let session_cancel = cancel.child_token();
    let writer = tokio::spawn(run_writer(
        sink,
        rx,
        session_cancel.clone(),
        eui,
        Arc::clone(&session.inner.stats),
    ));
    session.bind_outbound(tx);
    session.set_state(SessionState::Active);
    info!("session active: eui={eui}");

    let outcome = loop {
        select! {
            biased;

            () = session_cancel.cancelled() => break Ok(CloseReason::Cancelled),
            inbound = next_inbound(&mut stream) => match inbound {
                Ok(Inbound::Text(text)) => session.dispatch_text(&text, server),
                Ok(Inbound::Binary(bytes)) => session.dispatch_binary(bytes.len()),
                Ok(Inbound::Close) => break Ok(CloseReason::PeerClosed),
                Ok(Inbound::End) => break Ok(CloseReason::Disconnected),
                Err(e) => break Err(SessionError::Transport(e)),
            },
        }
    };

    session.unbind_outbound();
    session_cancel.cancel();
    let writer_failed = match writer.await {
        Ok(result) => result.is_err(),
        Err(e) => {
            error!("writer task failed: eui={eui}, error={e}");
            true
        }
    };
    match outcome {
        Ok(CloseReason::Cancelled) if writer_failed && !cancel.is_cancelled() => {
            Err(SessionError::WriteFailed)
        }
        other => other,
    }
}
