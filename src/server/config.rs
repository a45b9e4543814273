//! Builder methods for [`StationServer`].

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use super::{BackoffConfig, ServerState, StationServer, Unbound};
use crate::{discovery::DiscoveryConfig, hooks::NetworkServer, session::SessionConfig};

impl<S: NetworkServer> StationServer<S, Unbound> {
    /// Create a server delegating to `network`.
    ///
    /// Session and discovery settings start at their defaults, no handshake
    /// timeout is applied, and the listener is unset; call
    /// [`bind`](Self::bind) before running the server.
    #[must_use]
    pub fn new(network: S) -> Self { Self::from_arc(Arc::new(network)) }

    /// Create a server sharing an existing `network` handle.
    #[must_use]
    pub fn from_arc(network: Arc<S>) -> Self {
        Self {
            network,
            session_config: SessionConfig::default(),
            discovery_config: DiscoveryConfig::default(),
            handshake_timeout: None,
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<S, St> StationServer<S, St>
where
    S: NetworkServer,
    St: ServerState,
{
    /// Settings applied to every station session.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Settings applied to every discovery exchange.
    #[must_use]
    pub fn discovery_config(mut self, config: DiscoveryConfig) -> Self {
        self.discovery_config = config;
        self
    }

    /// Abort WebSocket upgrades that take longer than `limit`.
    #[must_use]
    pub fn handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = Some(limit);
        self
    }

    /// Pacing of retries after failed accepts. The config is normalized.
    #[must_use]
    pub fn accept_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config.normalized();
        self
    }

    /// Configure a channel used to signal when the server is accepting.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// The shared [`NetworkServer`].
    #[must_use]
    pub fn network(&self) -> &Arc<S> { &self.network }
}
