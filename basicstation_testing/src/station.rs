//! Gateway simulator speaking the station side of the protocol.

use std::time::Duration;

use basicstation::{
    codec::{self, CodecError},
    discovery::{DISCOVERY_PATH, DiscoveryResponse},
    eui::Eui,
    message::{Message, RouterConfig, Version},
};
use futures::{SinkExt, StreamExt};
use log::debug;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{net::TcpStream, time::sleep};
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};

use crate::sample_version;

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Failures observed by a [`MockStation`].
#[derive(Debug, Error)]
pub enum StationError {
    #[error("websocket error: {0}")]
    Transport(#[from] WsError),
    #[error("invalid JSON from server: {0}")]
    Json(#[from] serde_json::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("no session connection is open")]
    NotConnected,
    #[error("server closed the connection")]
    Closed,
    #[error("expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: String },
}

/// Simulated LoRa gateway.
///
/// Performs discovery against `{base_uri}/router-info`, then opens the
/// session endpoint named in the response. Delays can be injected before the
/// discovery query and the version announcement to trip server deadlines.
#[derive(Debug)]
pub struct MockStation {
    eui: Eui,
    base_uri: String,
    version: Version,
    discovery_request: Option<Value>,
    discovery_delay: Duration,
    version_delay: Duration,
    connection: Option<Connection>,
}

impl MockStation {
    #[must_use]
    pub fn new(eui: Eui, base_uri: impl Into<String>) -> Self {
        Self {
            eui,
            base_uri: base_uri.into(),
            version: sample_version(),
            discovery_request: None,
            discovery_delay: Duration::ZERO,
            version_delay: Duration::ZERO,
            connection: None,
        }
    }

    #[must_use]
    pub fn eui(&self) -> Eui { self.eui }

    /// Announce `version` instead of the sample one.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Send `request` verbatim as the discovery query.
    #[must_use]
    pub fn with_discovery_request(mut self, request: Value) -> Self {
        self.discovery_request = Some(request);
        self
    }

    /// Wait `delay` after the discovery upgrade before querying.
    #[must_use]
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    /// Wait `delay` after the session upgrade before announcing the version.
    #[must_use]
    pub fn with_version_delay(mut self, delay: Duration) -> Self {
        self.version_delay = delay;
        self
    }

    /// Run one discovery exchange and return the server's answer.
    ///
    /// The default query is `{"router": "<eui>"}`.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Closed`] if the server hung up without
    /// answering, or a transport or JSON error.
    pub async fn discover(&mut self) -> Result<DiscoveryResponse, StationError> {
        let uri = format!("{}{DISCOVERY_PATH}", self.base_uri);
        debug!("discovery connect: eui={}, uri={uri}", self.eui);
        let (mut conn, _) = connect_async(uri).await?;
        if !self.discovery_delay.is_zero() {
            sleep(self.discovery_delay).await;
        }
        let request = self
            .discovery_request
            .clone()
            .unwrap_or_else(|| json!({ "router": self.eui.to_string() }));
        conn.send(WsMessage::Text(request.to_string())).await?;
        let text = next_text(&mut conn).await?.ok_or(StationError::Closed)?;
        let response: DiscoveryResponse = serde_json::from_str(&text)?;
        debug!("discovery response: eui={}, response={response:?}", self.eui);
        let _ = conn.close(None).await;
        Ok(response)
    }

    /// Open the session endpoint at `uri`, announce the version and return
    /// the router configuration the server sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the upgrade fails, the server closes before
    /// configuring the station, or the first frame is not a router
    /// configuration.
    pub async fn connect(&mut self, uri: &str) -> Result<RouterConfig, StationError> {
        debug!("session connect: eui={}, uri={uri}", self.eui);
        let (conn, _) = connect_async(uri).await?;
        let conn = self.connection.insert(conn);
        if !self.version_delay.is_zero() {
            sleep(self.version_delay).await;
        }
        let version = codec::encode(&Message::Version(self.version.clone()))?;
        conn.send(WsMessage::Text(version)).await?;
        match self.next_message().await? {
            Some(Message::RouterConfig(config)) => Ok(config),
            Some(other) => Err(StationError::Unexpected {
                expected: "router_config",
                got: other.kind().to_string(),
            }),
            None => Err(StationError::Closed),
        }
    }

    /// Discover, then connect to the advertised endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Unexpected`] if discovery reports an error,
    /// or any error from [`MockStation::discover`] or
    /// [`MockStation::connect`].
    pub async fn connect_discovered(&mut self) -> Result<RouterConfig, StationError> {
        let response = self.discover().await?;
        if response.is_error() {
            return Err(StationError::Unexpected {
                expected: "discovery redirect",
                got: response.error,
            });
        }
        self.connect(&response.uri).await
    }

    /// Encode and send `message` on the session connection.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::NotConnected`] before [`MockStation::connect`].
    pub async fn send(&mut self, message: &Message) -> Result<(), StationError> {
        let text = codec::encode(message)?;
        self.send_text(text).await
    }

    /// Send a raw text frame on the session connection.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::NotConnected`] before [`MockStation::connect`].
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), StationError> {
        self.conn()?.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    /// Send a binary frame on the session connection.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::NotConnected`] before [`MockStation::connect`].
    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), StationError> {
        self.conn()?.send(WsMessage::Binary(data)).await?;
        Ok(())
    }

    /// Next text frame from the server, or `None` once it closed.
    ///
    /// # Errors
    ///
    /// Returns a transport error or [`StationError::NotConnected`].
    pub async fn next_text(&mut self) -> Result<Option<String>, StationError> {
        next_text(self.conn()?).await
    }

    /// Next decoded message from the server, or `None` once it closed.
    ///
    /// # Errors
    ///
    /// Returns a transport or codec error, or [`StationError::NotConnected`].
    pub async fn next_message(&mut self) -> Result<Option<Message>, StationError> {
        loop {
            let Some(text) = self.next_text().await? else {
                return Ok(None);
            };
            if let Some(message) = codec::decode(text.as_bytes())? {
                return Ok(Some(message));
            }
        }
    }

    /// Close the session connection, if one is open.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the close handshake fails.
    pub async fn close(&mut self) -> Result<(), StationError> {
        if let Some(mut conn) = self.connection.take() {
            match conn.close(None).await {
                Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
                Err(e) => return Err(e.into()),
            }
            // Drain until the server acknowledges.
            while let Some(Ok(_)) = conn.next().await {}
        }
        Ok(())
    }

    fn conn(&mut self) -> Result<&mut Connection, StationError> {
        self.connection.as_mut().ok_or(StationError::NotConnected)
    }
}

async fn next_text(conn: &mut Connection) -> Result<Option<String>, StationError> {
    while let Some(frame) = conn.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => return Ok(Some(text)),
            Ok(WsMessage::Close(_)) => return Ok(None),
            Ok(_) => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}
