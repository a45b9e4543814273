//! Collaborator interface implemented by network servers.
//!
//! The protocol engine owns the wire: upgrades, deadlines, framing and the
//! session state machine. Everything that needs knowledge of the network
//! (which stations exist, where they should connect, what channel plan they
//! run, what to do with their traffic) is delegated to a [`NetworkServer`].
//!
//! A single implementation is shared by every connection the server accepts,
//! so methods take `&self` and may be called concurrently.

use std::{error::Error, net::SocketAddr};

use async_trait::async_trait;
use thiserror::Error;
use tokio_tungstenite::tungstenite::http::HeaderMap;

use crate::{
    discovery::DiscoveryResponse,
    eui::Eui,
    message::{Message, RouterConfig, Version},
    session::{CloseReason, SessionError, StationSession},
};

/// Metadata of the HTTP request that opened a connection.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    /// Request path, e.g. `/router-info`.
    pub path: String,
    /// Headers sent with the upgrade request.
    pub headers: HeaderMap,
    /// Remote address of the station, when known.
    pub peer_addr: Option<SocketAddr>,
}

/// Errors returned by [`NetworkServer`] implementations.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The station is not provisioned on this network.
    #[error("unknown station {0}")]
    UnknownStation(Eui),
    /// A backing service could not answer.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// Any other failure.
    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// Callbacks invoked by the discovery handshake and station sessions.
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use basicstation::{
///     discovery::DiscoveryResponse,
///     eui::Eui,
///     hooks::{HandlerError, NetworkServer, RequestInfo},
///     message::{Message, RouterConfig},
///     session::StationSession,
/// };
///
/// struct Lab;
///
/// #[async_trait]
/// impl NetworkServer for Lab {
///     async fn discovery_response(
///         &self,
///         router: Eui,
///         _request: &RequestInfo,
///     ) -> Result<DiscoveryResponse, HandlerError> {
///         Ok(DiscoveryResponse::redirect(
///             router,
///             format!("ws://lab:6038/{router}"),
///             "lab",
///         ))
///     }
///
///     async fn router_config(
///         &self,
///         _session: &StationSession,
///     ) -> Result<RouterConfig, HandlerError> {
///         Ok(RouterConfig::default())
///     }
///
///     fn receive(&self, session: &StationSession, message: Message) {
///         log::info!("{}: {message:?}", session.eui());
///     }
/// }
/// ```
#[async_trait]
pub trait NetworkServer: Send + Sync + 'static {
    /// Resolve a station to the endpoint it should open its session on.
    ///
    /// The returned `router` field is overwritten with the canonical form of
    /// `router` before the response is sent.
    async fn discovery_response(
        &self,
        router: Eui,
        request: &RequestInfo,
    ) -> Result<DiscoveryResponse, HandlerError>;

    /// Produce the channel plan for a station that completed its version
    /// handshake. Called exactly once per session.
    async fn router_config(&self, session: &StationSession) -> Result<RouterConfig, HandlerError>;

    /// Called once the session endpoint has been upgraded, before any frame is
    /// read.
    async fn on_session_start(&self, _session: &StationSession) {}

    /// Called with the station's version announcement before the router
    /// configuration is requested. [`StationSession::version`] already
    /// returns it.
    async fn set_version(&self, _session: &StationSession, _version: &Version) {}

    /// Deliver a decoded message.
    ///
    /// Messages arrive in wire order. Only station traffic is delivered:
    /// `dnmsg` and `router_config` frames sent by a station are counted and
    /// dropped. This runs on the session's receive path,
    /// so implementations should hand work off rather than block.
    fn receive(&self, session: &StationSession, message: Message);

    /// Called once when the session has ended, with the reason it closed or
    /// the error that ended it.
    async fn on_session_end(
        &self,
        _session: &StationSession,
        _outcome: Result<&CloseReason, &SessionError>,
    ) {
    }
}
