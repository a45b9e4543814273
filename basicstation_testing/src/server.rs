//! Running a [`StationServer`] and building in-memory transports.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use basicstation::{
    hooks::NetworkServer,
    server::{ServerError, StationServer},
};
use tokio::{
    io::{DuplexStream, duplex},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{WebSocketStream, tungstenite::protocol::Role};

use crate::{RecordingServer, TestResult};

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// Connected WebSocket pair over an in-memory pipe: `(server, client)`.
pub async fn duplex_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (server, client)
}

/// A [`StationServer`] running on a free local port.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Start a [`RecordingServer`]-backed server whose redirects point back
    /// at itself.
    ///
    /// # Errors
    ///
    /// Returns an error if no port could be bound or the server never became
    /// ready.
    pub async fn start(network: RecordingServer) -> TestResult<Self> {
        let listener = unused_listener()?;
        let addr = listener.local_addr()?;
        let network = network.with_uri_base(format!("ws://{addr}"));
        Self::launch(StationServer::new(network), listener).await
    }

    /// Bind a configured server to `listener` and run it.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server never became ready.
    pub async fn launch<S: NetworkServer>(
        server: StationServer<S>,
        listener: StdTcpListener,
    ) -> TestResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = server.ready_signal(ready_tx).bind_listener(listener)?;
        let addr = server
            .local_addr()
            .ok_or("server has no local address")?;
        let (stop, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_with_shutdown(async {
            let _ = stop_rx.await;
        }));
        ready_rx.await?;
        Ok(Self { addr, stop, handle })
    }

    /// Address the server accepts connections on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// `ws://` base URI of the server, without a trailing slash.
    #[must_use]
    pub fn base_uri(&self) -> String { format!("ws://{}", self.addr) }

    /// Stop accepting, cancel live sessions and wait for the server to exit.
    ///
    /// # Panics
    ///
    /// Panics if the server task panicked or returned an error.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        self.handle
            .await
            .expect("server task panicked")
            .expect("server failed");
    }
}
