//! Listener binding for [`StationServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::TcpListener;

use super::{Bound, ServerError, ServerState, StationServer, Unbound};
use crate::hooks::NetworkServer;

impl<S, St> StationServer<S, St>
where
    S: NetworkServer,
    St: ServerState,
{
    fn into_bound(self, std_listener: StdTcpListener) -> Result<StationServer<S, Bound>, ServerError> {
        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;
        let StationServer {
            network,
            session_config,
            discovery_config,
            handshake_timeout,
            backoff_config,
            ready_tx,
            ..
        } = self;
        Ok(StationServer {
            network,
            session_config,
            discovery_config,
            handshake_timeout,
            backoff_config,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }

    /// Bind to `addr`, replacing any existing listener.
    ///
    /// ```no_run
    /// # use basicstation::server::StationServer;
    /// # fn demo<S: basicstation::hooks::NetworkServer>(network: S) {
    /// let server = StationServer::new(network)
    ///     .bind(([0, 0, 0, 0], 6038).into())
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns a [`ServerError`] if binding or configuring the listener fails.
    pub fn bind(self, addr: SocketAddr) -> Result<StationServer<S, Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.into_bound(std_listener)
    }

    /// Bind to an existing standard listener, replacing any existing one.
    ///
    /// # Errors
    /// Returns a [`ServerError`] if configuring the listener fails.
    pub fn bind_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<StationServer<S, Bound>, ServerError> {
        self.into_bound(std_listener)
    }
}

impl<S: NetworkServer> StationServer<S, Unbound> {
    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }
}

impl<S: NetworkServer> StationServer<S, Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
