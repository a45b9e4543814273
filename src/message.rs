//! Typed Basic Station protocol messages.
//!
//! Every frame exchanged on a station session is a JSON object tagged with a
//! `msgtype` field. [`Message`] is the closed set of variants this crate
//! understands; the codec in [`crate::codec`] maps between it and the wire.
//!
//! Rust field names describe what a value means. Where the protocol uses a
//! different spelling (`MHdr`, `dC`, `txtime`, ...) the wire name is fixed with
//! a serde rename so encoding always produces protocol-conformant JSON.

mod router_config;

use std::fmt;

pub use router_config::{FskChannel, LoraStdChannel, Radio, RadioChannel, RouterConfig, Sx1301Conf};
use serde::{Deserialize, Serialize};

/// Name of the discriminator field carried by every message.
pub const MSGTYPE: &str = "msgtype";

/// Discriminator values recognised by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageKind {
    /// `version`: first message of every session.
    Version,
    /// `jreq`: a join request received over the air.
    JoinRequest,
    /// `updf`: an uplink data frame.
    Uplink,
    /// `dntxed`: confirmation that a downlink left the antenna.
    DnTxed,
    /// `propdf`: proprietary frame, recognised but discarded.
    Proprietary,
    /// `dnmsg`: downlink command sent by the server.
    Downlink,
    /// `router_config`: channel plan sent by the server.
    RouterConfig,
}

impl MessageKind {
    /// Every recognised kind, in wire order.
    pub const ALL: [Self; 7] = [
        Self::Version,
        Self::JoinRequest,
        Self::Uplink,
        Self::DnTxed,
        Self::Proprietary,
        Self::Downlink,
        Self::RouterConfig,
    ];

    /// The `msgtype` value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::JoinRequest => "jreq",
            Self::Uplink => "updf",
            Self::DnTxed => "dntxed",
            Self::Proprietary => "propdf",
            Self::Downlink => "dnmsg",
            Self::RouterConfig => "router_config",
        }
    }

    /// Returns `true` for kinds that only a server sends.
    #[must_use]
    pub const fn is_server_sent(self) -> bool { matches!(self, Self::Downlink | Self::RouterConfig) }

    /// Look up a kind from its `msgtype` value.
    #[must_use]
    pub fn from_wire(msgtype: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == msgtype)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Correlation data attached to radio events.
///
/// Downlinks answering an uplink must echo these values unchanged so the
/// station can schedule the transmission relative to the original reception.
/// On the wire the fields sit next to the owning message's own fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxContext {
    /// Radio context identifier (`rctx`).
    #[serde(rename = "rctx")]
    pub context: i64,
    /// Concentrator time reference (`xtime`).
    pub xtime: i64,
    /// GPS time of the event in microseconds, when the station has a fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpstime: Option<i64>,
}

/// Signal quality and timing reported with every received radio frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct UpInfo {
    /// Received signal strength in dBm.
    pub rssi: f64,
    /// Signal-to-noise ratio in dB.
    pub snr: f64,
    #[serde(flatten)]
    pub rx: RxContext,
}

/// Version announcement sent by a station right after connecting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Version {
    pub station: String,
    pub firmware: String,
    pub package: String,
    pub model: String,
    pub protocol: u32,
    pub features: String,
}

/// A LoRaWAN join request as parsed by the station.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JoinRequest {
    #[serde(rename = "MHdr")]
    pub mhdr: u8,
    #[serde(rename = "JoinEui")]
    pub join_eui: String,
    #[serde(rename = "DevEui")]
    pub dev_eui: String,
    #[serde(rename = "DevNonce")]
    pub dev_nonce: u16,
    #[serde(rename = "MIC")]
    pub mic: i32,
    #[serde(rename = "DR")]
    pub data_rate: u8,
    #[serde(rename = "Freq")]
    pub frequency: u32,
    #[serde(flatten)]
    pub up_info: UpInfo,
}

/// An uplink data frame as parsed by the station.
///
/// `DevAddr` and `MIC` are transmitted as signed 32-bit integers; a device
/// address with the top bit set arrives as a negative number and must stay
/// negative here.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Uplink {
    #[serde(rename = "MHdr")]
    pub mhdr: u8,
    #[serde(rename = "DevAddr")]
    pub dev_addr: i32,
    #[serde(rename = "FCtrl")]
    pub fctrl: u8,
    #[serde(rename = "FCnt")]
    pub fcnt: u16,
    #[serde(rename = "FOpts")]
    pub fopts: String,
    /// Application port, `-1` when the frame carries no port.
    #[serde(rename = "FPort")]
    pub fport: i16,
    #[serde(rename = "FRMPayload")]
    pub frm_payload: String,
    #[serde(rename = "MIC")]
    pub mic: i32,
    #[serde(rename = "DR")]
    pub data_rate: u8,
    #[serde(rename = "Freq")]
    pub frequency: u32,
    #[serde(flatten)]
    pub up_info: UpInfo,
}

/// Transmit confirmation for a previously sent [`Downlink`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DnTxed {
    /// Downlink identifier copied from the originating `dnmsg`.
    #[serde(rename = "diid")]
    pub downlink_id: i64,
    #[serde(rename = "DevEui")]
    pub dev_eui: String,
    /// Station time at which the frame was transmitted, in seconds.
    #[serde(rename = "txtime")]
    pub tx_time: f64,
    #[serde(flatten)]
    pub rx: RxContext,
}

/// Downlink command instructing a station to transmit a frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Downlink {
    #[serde(rename = "DevEui", skip_serializing_if = "Option::is_none")]
    pub dev_eui: Option<String>,
    /// LoRaWAN device class (0 = A, 1 = B, 2 = C).
    #[serde(rename = "dC")]
    pub device_class: u8,
    #[serde(rename = "diid")]
    pub downlink_id: i64,
    /// Hex-encoded PHY payload.
    pub pdu: String,
    #[serde(rename = "RxDelay")]
    pub rx_delay: u8,
    #[serde(rename = "RX1DR", skip_serializing_if = "Option::is_none")]
    pub rx1_data_rate: Option<u8>,
    #[serde(rename = "RX1Freq", skip_serializing_if = "Option::is_none")]
    pub rx1_frequency: Option<u32>,
    #[serde(rename = "RX2DR", skip_serializing_if = "Option::is_none")]
    pub rx2_data_rate: Option<u8>,
    #[serde(rename = "RX2Freq", skip_serializing_if = "Option::is_none")]
    pub rx2_frequency: Option<u32>,
    pub priority: u8,
    #[serde(flatten)]
    pub rx: RxContext,
}

impl Downlink {
    /// Build a class A downlink answering the radio event described by `rx`.
    #[must_use]
    pub fn reply_to(rx: RxContext, downlink_id: i64, pdu: impl Into<String>) -> Self {
        Self {
            downlink_id,
            pdu: pdu.into(),
            rx_delay: 1,
            rx,
            ..Self::default()
        }
    }
}

/// Tagged union of every message the codec understands.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "msgtype")]
pub enum Message {
    #[serde(rename = "version")]
    Version(Version),
    #[serde(rename = "jreq")]
    JoinRequest(JoinRequest),
    #[serde(rename = "updf")]
    Uplink(Uplink),
    #[serde(rename = "dntxed")]
    DnTxed(DnTxed),
    #[serde(rename = "dnmsg")]
    Downlink(Downlink),
    #[serde(rename = "router_config")]
    RouterConfig(RouterConfig),
}

impl Message {
    /// Return the discriminator of this message.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Version(_) => MessageKind::Version,
            Self::JoinRequest(_) => MessageKind::JoinRequest,
            Self::Uplink(_) => MessageKind::Uplink,
            Self::DnTxed(_) => MessageKind::DnTxed,
            Self::Downlink(_) => MessageKind::Downlink,
            Self::RouterConfig(_) => MessageKind::RouterConfig,
        }
    }

    /// Receive context of radio-bearing messages.
    #[must_use]
    pub fn rx_context(&self) -> Option<&RxContext> {
        match self {
            Self::JoinRequest(m) => Some(&m.up_info.rx),
            Self::Uplink(m) => Some(&m.up_info.rx),
            Self::DnTxed(m) => Some(&m.rx),
            Self::Downlink(m) => Some(&m.rx),
            Self::Version(_) | Self::RouterConfig(_) => None,
        }
    }
}

impl From<RouterConfig> for Message {
    fn from(config: RouterConfig) -> Self { Self::RouterConfig(config) }
}

impl From<Downlink> for Message {
    fn from(downlink: Downlink) -> Self { Self::Downlink(downlink) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("version", MessageKind::Version)]
    #[case("jreq", MessageKind::JoinRequest)]
    #[case("updf", MessageKind::Uplink)]
    #[case("dntxed", MessageKind::DnTxed)]
    #[case("propdf", MessageKind::Proprietary)]
    #[case("dnmsg", MessageKind::Downlink)]
    #[case("router_config", MessageKind::RouterConfig)]
    fn kinds_round_trip_through_wire_names(#[case] wire: &str, #[case] kind: MessageKind) {
        assert_eq!(MessageKind::from_wire(wire), Some(kind));
        assert_eq!(kind.as_str(), wire);
    }

    #[test]
    fn only_commands_are_server_sent() {
        let server_sent: Vec<_> = MessageKind::ALL
            .into_iter()
            .filter(|kind| kind.is_server_sent())
            .collect();
        assert_eq!(server_sent, [MessageKind::Downlink, MessageKind::RouterConfig]);
    }

    #[test]
    fn unknown_wire_name_has_no_kind() {
        assert_eq!(MessageKind::from_wire("VERSION"), None);
    }

    #[test]
    fn reply_echoes_receive_context() {
        let rx = RxContext {
            context: 7,
            xtime: 0x0012_3456_789a,
            gpstime: Some(1_300_000_000_000_000),
        };
        let downlink = Downlink::reply_to(rx, 42, "00ff");
        assert_eq!(Message::from(downlink).rx_context(), Some(&rx));
    }
}
