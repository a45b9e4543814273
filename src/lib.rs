#![doc(html_root_url = "https://docs.rs/basicstation/latest")]
//! Server side of the LoRa Basic Station protocol.
//!
//! Stations first query the discovery endpoint (`/router-info`) to learn
//! which session endpoint to use, then hold a long-lived WebSocket on
//! `/{eui}` over which they announce their version, receive a channel plan
//! and exchange uplink and downlink traffic.
//!
//! [`StationServer`] accepts both kinds of connection and delegates every
//! network decision to a [`NetworkServer`] implementation.

pub mod codec;
pub mod discovery;
pub mod eui;
pub mod hooks;
pub mod message;
pub mod metrics;
pub mod server;
pub mod session;
pub mod transport;

pub use codec::{CodecError, decode, encode};
pub use discovery::{DiscoveryConfig, DiscoveryError, DiscoveryResponse, run_discovery};
pub use eui::{Eui, EuiError};
pub use hooks::{HandlerError, NetworkServer, RequestInfo};
pub use message::{Message, MessageKind, RouterConfig};
pub use metrics::{DECODE_ERRORS_TOTAL, Direction, FRAMES_TOTAL, SESSIONS_ACTIVE};
pub use server::{ServerError, StationServer};
pub use session::{
    CloseReason,
    SessionConfig,
    SessionError,
    SessionState,
    StationSession,
    StatsSnapshot,
    WriteError,
    run_session,
};
