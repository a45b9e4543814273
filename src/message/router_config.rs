//! Router configuration delivered to a station after its version handshake.
//!
//! The engine never interprets these values; it only needs them to survive a
//! trip through the codec untouched. Regional channel plans are built by the
//! [`NetworkServer`](crate::hooks::NetworkServer) implementation.

use serde::{Deserialize, Serialize};

/// Channel plan and operating mode offered to a station.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Regulatory region tag such as `US902` or `EU863`.
    pub region: String,
    /// Concentrator hardware spec, e.g. `sx1301/1`.
    pub hwspec: String,
    /// Data rate table: `[spreading factor, bandwidth kHz, downlink only]`.
    #[serde(rename = "DRs", skip_serializing_if = "Vec::is_empty")]
    pub data_rates: Vec<[i32; 3]>,
    /// Network identifiers whose traffic the station forwards.
    #[serde(rename = "NetID", skip_serializing_if = "Vec::is_empty")]
    pub net_ids: Vec<u32>,
    /// Inclusive JoinEUI ranges whose join requests the station forwards.
    #[serde(rename = "JoinEui", skip_serializing_if = "Vec::is_empty")]
    pub join_eui_ranges: Vec<[u64; 2]>,
    /// Lowest and highest permitted frequency in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_range: Option<[u32; 2]>,
    /// One entry per SX1301 chip on the concentrator board.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sx1301_conf: Vec<Sx1301Conf>,
    /// Disable clear-channel assessment.
    #[serde(skip_serializing_if = "is_false")]
    pub nocca: bool,
    /// Disable duty-cycle limits.
    #[serde(skip_serializing_if = "is_false")]
    pub nodc: bool,
    /// Disable dwell-time limits.
    #[serde(skip_serializing_if = "is_false")]
    pub nodwell: bool,
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "serde skip_serializing_if passes fields by reference"
)]
fn is_false(value: &bool) -> bool { !*value }

/// Radio front-end of an SX1301 chip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Radio {
    pub enable: bool,
    /// Centre frequency in Hz.
    pub freq: u32,
}

/// Multi-SF LoRa channel bound to one of the chip's radios.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioChannel {
    pub enable: bool,
    pub radio: u8,
    /// Offset from the radio centre frequency in Hz.
    #[serde(rename = "if")]
    pub if_offset: i32,
}

/// Single-SF LoRa channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraStdChannel {
    pub enable: bool,
    pub radio: u8,
    #[serde(rename = "if")]
    pub if_offset: i32,
    /// Bandwidth in Hz.
    pub bandwidth: u32,
    pub spread_factor: u8,
}

/// FSK channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FskChannel {
    pub enable: bool,
    pub radio: u8,
    #[serde(rename = "if")]
    pub if_offset: i32,
    pub bandwidth: u32,
    pub datarate: u32,
}

/// Mapping of the channel plan onto a single SX1301 chip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sx1301Conf {
    pub radio_0: Radio,
    pub radio_1: Radio,
    #[serde(rename = "chan_multiSF_0")]
    pub chan_multi_sf_0: RadioChannel,
    #[serde(rename = "chan_multiSF_1")]
    pub chan_multi_sf_1: RadioChannel,
    #[serde(rename = "chan_multiSF_2")]
    pub chan_multi_sf_2: RadioChannel,
    #[serde(rename = "chan_multiSF_3")]
    pub chan_multi_sf_3: RadioChannel,
    #[serde(rename = "chan_multiSF_4")]
    pub chan_multi_sf_4: RadioChannel,
    #[serde(rename = "chan_multiSF_5")]
    pub chan_multi_sf_5: RadioChannel,
    #[serde(rename = "chan_multiSF_6")]
    pub chan_multi_sf_6: RadioChannel,
    #[serde(rename = "chan_multiSF_7")]
    pub chan_multi_sf_7: RadioChannel,
    #[serde(rename = "chan_Lora_std")]
    pub chan_lora_std: LoraStdChannel,
    #[serde(rename = "chan_FSK")]
    pub chan_fsk: FskChannel,
}

impl Sx1301Conf {
    /// Multi-SF channels in index order.
    #[must_use]
    pub fn multi_sf_channels(&self) -> [&RadioChannel; 8] {
        [
            &self.chan_multi_sf_0,
            &self.chan_multi_sf_1,
            &self.chan_multi_sf_2,
            &self.chan_multi_sf_3,
            &self.chan_multi_sf_4,
            &self.chan_multi_sf_5,
            &self.chan_multi_sf_6,
            &self.chan_multi_sf_7,
        ]
    }
}
