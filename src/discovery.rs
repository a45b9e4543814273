//! Discovery handshake.
//!
//! A station that boots first connects to [`DISCOVERY_PATH`], sends a single
//! JSON object naming itself, and expects a single answer telling it where to
//! open its long-lived session. The connection is then closed, whatever the
//! outcome. A station that receives no answer simply retries discovery.

use std::time::Duration;

use futures::SinkExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::{
    codec::{self, CodecError},
    eui::{Eui, EuiError},
    hooks::{HandlerError, NetworkServer, RequestInfo},
    metrics::{self, Direction},
    transport::{Inbound, Transport, WsError, WsMessage, next_inbound},
};

/// HTTP path on which discovery requests are accepted.
pub const DISCOVERY_PATH: &str = "/router-info";

/// Deadline applied to each read and write of the discovery exchange.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepted spellings of the station identifier key.
const ROUTER_KEYS: [&str; 2] = ["router", "Router"];

/// Error text returned when the request names no station.
pub const MISSING_ROUTER: &str = "Missing router field";

/// Kind label used for discovery frames in metrics.
const DISCOVERY_KIND: &str = "discovery";

/// Tunables for the discovery handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Deadline for reading the request and for writing the response.
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

/// Answer to a discovery request.
///
/// A successful answer carries the station's canonical identifier, the
/// session endpoint to connect to and an opaque server tag. A failed lookup
/// carries only `error`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Eui>,
    /// WebSocket URI of the session endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    /// Identifier of the server instance that will handle the session.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub muxs: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl DiscoveryResponse {
    /// Redirect `router` to the session endpoint at `uri`.
    #[must_use]
    pub fn redirect(router: Eui, uri: impl Into<String>, muxs: impl Into<String>) -> Self {
        Self {
            router: Some(router),
            uri: uri.into(),
            muxs: muxs.into(),
            error: String::new(),
        }
    }

    /// A response carrying only an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if this response reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool { !self.error.is_empty() }
}

/// Reasons a discovery exchange did not produce a redirect.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Reading or writing the connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] WsError),
    /// The request or response missed its deadline.
    #[error("discovery timed out after {0:?}")]
    Timeout(Duration),
    /// The station closed the connection without sending a request.
    #[error("connection closed before a request was received")]
    ConnectionClosed,
    /// The request was not a JSON object.
    #[error("malformed discovery request: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The request did not carry a router field.
    #[error("discovery request has no router field")]
    MissingRouter,
    /// The router field could not be parsed as a station identifier.
    #[error("invalid router field: {0}")]
    InvalidRouter(#[source] EuiError),
    /// The network server could not resolve the station.
    #[error("discovery lookup failed: {0}")]
    Handler(#[source] HandlerError),
    /// The response could not be serialized.
    #[error("discovery response failed to encode: {0}")]
    Encode(#[source] CodecError),
}

/// Run one discovery exchange and close the connection.
///
/// Returns the identifier of the station that was redirected.
///
/// Only an unparsable or missing identifier is answered with an error
/// response. Every other failure closes the connection without a reply.
///
/// # Errors
///
/// Returns a [`DiscoveryError`] describing why no redirect was sent.
pub async fn run_discovery<T, S>(
    mut transport: T,
    request: &RequestInfo,
    server: &S,
    config: &DiscoveryConfig,
) -> Result<Eui, DiscoveryError>
where
    T: Transport,
    S: NetworkServer + ?Sized,
{
    let result = exchange(&mut transport, request, server, config).await;
    match timeout(config.timeout, transport.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("discovery close failed: error={e}"),
        Err(_) => debug!("discovery close timed out"),
    }
    match &result {
        Ok(eui) => info!("discovery answered: eui={eui}, peer_addr={:?}", request.peer_addr),
        Err(e) => warn!(
            "discovery failed: error={e}, peer_addr={:?}",
            request.peer_addr
        ),
    }
    result
}

async fn exchange<T, S>(
    transport: &mut T,
    request: &RequestInfo,
    server: &S,
    config: &DiscoveryConfig,
) -> Result<Eui, DiscoveryError>
where
    T: Transport,
    S: NetworkServer + ?Sized,
{
    let payload = match timeout(config.timeout, next_inbound(transport)).await {
        Err(_) => return Err(DiscoveryError::Timeout(config.timeout)),
        Ok(inbound) => match inbound? {
            Inbound::Text(text) => text.into_bytes(),
            Inbound::Binary(bytes) => bytes,
            Inbound::Close | Inbound::End => return Err(DiscoveryError::ConnectionClosed),
        },
    };
    metrics::inc_frames(Direction::Inbound, DISCOVERY_KIND);

    let fields: Map<String, Value> =
        serde_json::from_slice(&payload).map_err(DiscoveryError::Malformed)?;
    let router = match parse_router(&fields) {
        Ok(router) => router,
        Err(e) => {
            let message = match &e {
                DiscoveryError::InvalidRouter(cause) => cause.to_string(),
                _ => MISSING_ROUTER.to_owned(),
            };
            send_response(transport, &DiscoveryResponse::error(message), config).await?;
            return Err(e);
        }
    };
    debug!("discovery request: eui={router}");

    let mut response = server
        .discovery_response(router, request)
        .await
        .map_err(DiscoveryError::Handler)?;
    response.router = Some(router);
    send_response(transport, &response, config).await?;
    Ok(router)
}

fn parse_router(fields: &Map<String, Value>) -> Result<Eui, DiscoveryError> {
    let value = ROUTER_KEYS
        .iter()
        .find_map(|key| fields.get(*key))
        .ok_or(DiscoveryError::MissingRouter)?;
    Eui::parse_value(value).map_err(DiscoveryError::InvalidRouter)
}

async fn send_response<T: Transport>(
    transport: &mut T,
    response: &DiscoveryResponse,
    config: &DiscoveryConfig,
) -> Result<(), DiscoveryError> {
    let frame = codec::encode_json(response).map_err(DiscoveryError::Encode)?;
    match timeout(config.timeout, transport.send(WsMessage::Text(frame))).await {
        Err(_) => Err(DiscoveryError::Timeout(config.timeout)),
        Ok(sent) => {
            sent?;
            metrics::inc_frames(Direction::Outbound, DISCOVERY_KIND);
            Ok(())
        }
    }
}

