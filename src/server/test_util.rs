//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Mutex,
};

use async_trait::async_trait;
use rstest::fixture;

use super::{Bound, StationServer};
use crate::{
    discovery::DiscoveryResponse,
    eui::Eui,
    hooks::{HandlerError, NetworkServer, RequestInfo},
    message::{Message, RouterConfig},
    session::StationSession,
};

/// Network server answering every station the same way and recording
/// delivered messages.
#[derive(Debug, Default)]
pub struct StaticServer {
    pub received: Mutex<Vec<(Eui, Message)>>,
}

#[async_trait]
impl NetworkServer for StaticServer {
    async fn discovery_response(
        &self,
        router: Eui,
        _request: &RequestInfo,
    ) -> Result<DiscoveryResponse, HandlerError> {
        Ok(DiscoveryResponse::redirect(
            router,
            format!("ws://127.0.0.1/{router}"),
            "muxs-test",
        ))
    }

    async fn router_config(&self, _session: &StationSession) -> Result<RouterConfig, HandlerError> {
        Ok(RouterConfig {
            region: "EU863".into(),
            ..RouterConfig::default()
        })
    }

    fn receive(&self, session: &StationSession, message: Message) {
        self.received
            .lock()
            .expect("received lock")
            .push((session.eui(), message));
    }
}

/// Network server whose discovery lookup panics.
#[derive(Debug, Default)]
pub struct PanickingServer;

#[async_trait]
impl NetworkServer for PanickingServer {
    async fn discovery_response(
        &self,
        _router: Eui,
        _request: &RequestInfo,
    ) -> Result<DiscoveryResponse, HandlerError> {
        panic!("boom")
    }

    async fn router_config(&self, _session: &StationSession) -> Result<RouterConfig, HandlerError> {
        Ok(RouterConfig::default())
    }

    fn receive(&self, _session: &StationSession, _message: Message) {}
}

#[fixture]
pub fn static_server() -> StaticServer { StaticServer::default() }

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server<S: NetworkServer>(network: S, listener: StdTcpListener) -> StationServer<S, Bound> {
    StationServer::new(network)
        .bind_listener(listener)
        .expect("Failed to bind")
}
