//! Connection handling for [`StationServer`](super::StationServer).

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use futures::FutureExt;
use log::{error, warn};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    discovery::{DISCOVERY_PATH, DiscoveryConfig, run_discovery},
    eui::{Eui, EuiError},
    hooks::{NetworkServer, RequestInfo},
    session::{SessionConfig, SessionError, StationSession, run_session},
};

/// Destination of an upgrade request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// The discovery endpoint.
    Discovery,
    /// The session endpoint of one station.
    Station(Eui),
}

/// Resolve a request path to its endpoint.
///
/// ```
/// use basicstation::{
///     eui::Eui,
///     server::{Route, route_for},
/// };
///
/// assert_eq!(route_for("/router-info"), Ok(Route::Discovery));
/// assert_eq!(
///     route_for("/b827ebfffe000001"),
///     Ok(Route::Station(Eui::new(0xb827_ebff_fe00_0001)))
/// );
/// assert!(route_for("/a/b").is_err());
/// ```
///
/// # Errors
///
/// Returns an [`EuiError`] if the path is not the discovery endpoint and its
/// single segment is not a station identifier.
pub fn route_for(path: &str) -> Result<Route, EuiError> {
    if path == DISCOVERY_PATH {
        return Ok(Route::Discovery);
    }
    let segment = path.strip_prefix('/').unwrap_or(path);
    if segment.is_empty() || segment.contains('/') {
        return Err(EuiError::InvalidFormat(path.to_owned()));
    }
    Eui::parse_str(segment).map(Route::Station)
}

/// Per-connection settings shared by every task the accept loop spawns.
pub(in crate::server) struct ConnectionOptions<S> {
    pub network: Arc<S>,
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
    pub handshake_timeout: Option<Duration>,
    pub shutdown: CancellationToken,
}

impl<S> Clone for ConnectionOptions<S> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
            session: self.session,
            discovery: self.discovery,
            handshake_timeout: self.handshake_timeout,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S> fmt::Debug for ConnectionOptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("session", &self.session)
            .field("discovery", &self.discovery)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// Spawn a task to process a single TCP connection, logging and discarding any panics.
pub(super) fn spawn_connection_task<S>(
    stream: TcpStream,
    options: ConnectionOptions<S>,
    tracker: &TaskTracker,
) where
    S: NetworkServer,
{
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Failed to retrieve peer address: error={e}");
            None
        }
    };
    tracker.spawn(async move {
        let fut = std::panic::AssertUnwindSafe(process_stream(stream, peer_addr, options))
            .catch_unwind();

        if let Err(panic) = fut.await {
            let panic_msg = format_panic(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
            tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
        }
    });
}

fn format_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("{panic:?}")
    }
}

fn not_found(reason: &SessionError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

async fn process_stream<S>(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    options: ConnectionOptions<S>,
) where
    S: NetworkServer,
{
    let mut routed: Option<(Route, RequestInfo)> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path().to_owned();
        match route_for(&path) {
            Ok(route) => {
                routed = Some((
                    route,
                    RequestInfo {
                        path,
                        headers: request.headers().clone(),
                        peer_addr,
                    },
                ));
                Ok(response)
            }
            Err(e) => {
                let err = SessionError::from(e);
                warn!(
                    "upgrade rejected: path={path}, error={err}, category={}, peer_addr={peer_addr:?}",
                    err.category()
                );
                Err(not_found(&err))
            }
        }
    };

    let upgrade = accept_hdr_async(stream, callback);
    let upgraded = match options.handshake_timeout {
        Some(limit) => {
            if let Ok(res) = timeout(limit, upgrade).await {
                res
            } else {
                warn!("websocket upgrade timed out: peer_addr={peer_addr:?}, limit={limit:?}");
                return;
            }
        }
        None => upgrade.await,
    };
    let ws = match upgraded {
        Ok(ws) => ws,
        Err(e) => {
            warn!("websocket upgrade failed: error={e}, peer_addr={peer_addr:?}");
            return;
        }
    };
    let Some((route, request)) = routed else {
        return;
    };

    match route {
        Route::Discovery => {
            // Outcome is logged by the handshake itself.
            let _ = run_discovery(ws, &request, options.network.as_ref(), &options.discovery).await;
        }
        Route::Station(eui) => {
            let session = StationSession::new(eui);
            let _ = run_session(
                ws,
                session,
                options.network,
                options.session,
                options.shutdown.child_token(),
            )
            .await;
        }
    }
}
