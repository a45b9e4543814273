//! WebSocket transport abstraction.
//!
//! Discovery and sessions run over any message-oriented duplex that speaks
//! `tungstenite` frames: a server-side [`WebSocketStream`] over TCP in
//! production, or an in-memory stream in tests.
//!
//! [`WebSocketStream`]: tokio_tungstenite::WebSocketStream

use futures::{Sink, Stream, StreamExt};
pub use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// Bidirectional WebSocket frame transport.
pub trait Transport:
    Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Send + Unpin + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<WsMessage, WsError>>
        + Sink<WsMessage, Error = WsError>
        + Send
        + Unpin
        + 'static
{
}

/// Protocol-relevant view of an inbound frame.
#[derive(Debug)]
pub(crate) enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    /// The peer sent a close frame.
    Close,
    /// The stream ended without a close frame.
    End,
}

/// Read the next data or close frame, skipping control frames.
///
/// Cancel-safe: the only suspension point is the underlying `next()`.
pub(crate) async fn next_inbound<S>(stream: &mut S) -> Result<Inbound, WsError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        match stream.next().await {
            None | Some(Err(WsError::ConnectionClosed)) => return Ok(Inbound::End),
            Some(Err(e)) => return Err(e),
            Some(Ok(WsMessage::Text(text))) => return Ok(Inbound::Text(text)),
            Some(Ok(WsMessage::Binary(bytes))) => return Ok(Inbound::Binary(bytes)),
            Some(Ok(WsMessage::Close(_))) => return Ok(Inbound::Close),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
        }
    }
}
