//! A network server that reports every callback to the test.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use basicstation::{
    discovery::DiscoveryResponse,
    eui::Eui,
    hooks::{HandlerError, NetworkServer, RequestInfo},
    message::{Message, RouterConfig, Version},
    session::{CloseReason, SessionError, StationSession},
};
use tokio::{sync::mpsc, time::timeout};

use crate::sample_router_config;

/// Callback observed by a [`RecordingServer`].
#[derive(Clone, Debug)]
pub enum Event {
    Discovery { router: Eui, path: String },
    /// Carries the live handle so tests can write to the station.
    SessionStarted(StationSession),
    Version(Eui, Version),
    Received(Eui, Message),
    /// `Ok` carries the close reason, `Err` the error category.
    SessionEnded(Eui, Result<CloseReason, &'static str>),
}

/// [`NetworkServer`] that redirects stations to `{uri_base}/{eui}` and
/// forwards every callback as an [`Event`].
#[derive(Debug)]
pub struct RecordingServer {
    uri_base: String,
    muxs: String,
    router_config: RouterConfig,
    unknown: HashSet<Eui>,
    events: mpsc::UnboundedSender<Event>,
}

impl RecordingServer {
    /// Create a server and the receiver its events are delivered on.
    ///
    /// The redirect base defaults to `ws://127.0.0.1`; [`TestServer`]
    /// replaces it with the bound address.
    ///
    /// [`TestServer`]: crate::TestServer
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        let server = Self {
            uri_base: "ws://127.0.0.1".into(),
            muxs: "muxs-test".into(),
            router_config: sample_router_config(),
            unknown: HashSet::new(),
            events,
        };
        (server, rx)
    }

    /// Redirect stations to endpoints under `uri_base`.
    #[must_use]
    pub fn with_uri_base(mut self, uri_base: impl Into<String>) -> Self {
        self.uri_base = uri_base.into();
        self
    }

    /// Hand out `config` to every station.
    #[must_use]
    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    /// Treat `eui` as unprovisioned: discovery and configuration fail.
    #[must_use]
    pub fn reject(mut self, eui: Eui) -> Self {
        self.unknown.insert(eui);
        self
    }

    fn emit(&self, event: Event) { let _ = self.events.send(event); }
}

#[async_trait]
impl NetworkServer for RecordingServer {
    async fn discovery_response(
        &self,
        router: Eui,
        request: &RequestInfo,
    ) -> Result<DiscoveryResponse, HandlerError> {
        self.emit(Event::Discovery {
            router,
            path: request.path.clone(),
        });
        if self.unknown.contains(&router) {
            return Err(HandlerError::UnknownStation(router));
        }
        Ok(DiscoveryResponse::redirect(
            router,
            format!("{}/{router}", self.uri_base),
            self.muxs.clone(),
        ))
    }

    async fn router_config(&self, session: &StationSession) -> Result<RouterConfig, HandlerError> {
        if self.unknown.contains(&session.eui()) {
            return Err(HandlerError::UnknownStation(session.eui()));
        }
        Ok(self.router_config.clone())
    }

    async fn on_session_start(&self, session: &StationSession) {
        self.emit(Event::SessionStarted(session.clone()));
    }

    async fn set_version(&self, session: &StationSession, version: &Version) {
        self.emit(Event::Version(session.eui(), version.clone()));
    }

    fn receive(&self, session: &StationSession, message: Message) {
        self.emit(Event::Received(session.eui(), message));
    }

    async fn on_session_end(
        &self,
        session: &StationSession,
        outcome: Result<&CloseReason, &SessionError>,
    ) {
        let outcome = outcome.copied().map_err(SessionError::category);
        self.emit(Event::SessionEnded(session.eui(), outcome));
    }
}

/// Wait up to two seconds for the next event.
///
/// # Panics
///
/// Panics if no event arrives in time or the server was dropped.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no event within two seconds")
        .expect("recording server dropped")
}
