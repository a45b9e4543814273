//! Tokio-based WebSocket server for Basic Station traffic.
//!
//! `StationServer` accepts TCP connections, upgrades them to WebSocket and
//! routes each one by request path: [`DISCOVERY_PATH`] runs the discovery
//! handshake, `/{eui}` runs a station session. Every connection runs in its
//! own tracked task holding a child of the server's shutdown token, so
//! stopping the server ends all live sessions.
//!
//! [`DISCOVERY_PATH`]: crate::discovery::DISCOVERY_PATH

use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::oneshot};

use crate::{discovery::DiscoveryConfig, hooks::NetworkServer, session::SessionConfig};

/// WebSocket server delegating protocol decisions to a [`NetworkServer`].
///
/// The server carries a typestate `St` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](StationServer::bind) or
/// [`bind_listener`](StationServer::bind_listener) before running.
pub struct StationServer<S, St = Unbound>
where
    S: NetworkServer,
    St: ServerState,
{
    pub(crate) network: Arc<S>,
    pub(crate) session_config: SessionConfig,
    pub(crate) discovery_config: DiscoveryConfig,
    pub(crate) handshake_timeout: Option<Duration>,
    pub(crate) backoff_config: BackoffConfig,
    /// Channel used to notify when the server is ready.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so a
    /// new sender must be provided each time the server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: St,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod backoff;
mod binding;
mod config;
mod connection;
pub mod error;
mod runtime;

pub use backoff::BackoffConfig;
pub use connection::{Route, route_for};
pub use error::ServerError;

#[cfg(test)]
pub(crate) mod test_util;
