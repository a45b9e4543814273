//! Field-by-field conversion of a generic JSON object.
//!
//! A frame is first parsed into a [`serde_json::Map`]; the discriminator then
//! selects a target type which pulls its fields out of the map one at a time.
//! Pulling fields individually lets every conversion error name its field, and
//! lets a record absorb keys that belong to an embedded value such as
//! [`RxContext`] without modelling them as a nested object.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::CodecError;
use crate::message::{
    DnTxed,
    Downlink,
    JoinRequest,
    MSGTYPE,
    MessageKind,
    RouterConfig,
    RxContext,
    UpInfo,
    Uplink,
    Version,
};

/// Accepted spellings of the device EUI key.
const DEV_EUI_KEYS: &[&str] = &["DevEui", "DevEUI"];
/// Accepted spellings of the join EUI key.
const JOIN_EUI_KEYS: &[&str] = &["JoinEui", "JoinEUI"];
/// Accepted spellings of the SX1301 configuration key.
const SX1301_KEYS: &[&str] = &["sx1301_conf", "SX1301_conf"];

/// Generic key/value view of one inbound frame.
#[derive(Debug)]
pub(crate) struct Fields {
    map: Map<String, Value>,
}

impl Fields {
    /// Parse `bytes` as a JSON object.
    ///
    /// Integers are held exactly as `i64`/`u64` until a field is converted,
    /// so large values never pass through `f64`.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes)
            .map(|map| Self { map })
            .map_err(CodecError::Json)
    }

    /// Resolve the `msgtype` discriminator.
    pub(crate) fn message_kind(&self) -> Result<MessageKind, CodecError> {
        match self.map.get(MSGTYPE) {
            None => Err(CodecError::MissingMessageType),
            Some(Value::String(msgtype)) => MessageKind::from_wire(msgtype)
                .ok_or_else(|| CodecError::UnsupportedMessageType(msgtype.clone())),
            Some(other) => Err(CodecError::MessageTypeNotString {
                found: json_type(other),
            }),
        }
    }

    /// Convert the field named `key`, defaulting when absent or `null`.
    pub(crate) fn field<T>(&mut self, key: &'static str) -> Result<T, CodecError>
    where
        T: DeserializeOwned + Default,
    {
        self.field_any(&[key])
    }

    /// Convert the first present field among `keys`, defaulting when none is.
    pub(crate) fn field_any<T>(&mut self, keys: &[&'static str]) -> Result<T, CodecError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.optional_any(keys)?.unwrap_or_default())
    }

    /// Convert the field named `key` if it is present and not `null`.
    pub(crate) fn optional<T>(&mut self, key: &'static str) -> Result<Option<T>, CodecError>
    where
        T: DeserializeOwned,
    {
        self.optional_any(&[key])
    }

    fn optional_any<T>(&mut self, keys: &[&'static str]) -> Result<Option<T>, CodecError>
    where
        T: DeserializeOwned,
    {
        let Some((field, value)) = self.take(keys) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| CodecError::Field { field, source })
    }

    fn take(&mut self, keys: &[&'static str]) -> Option<(&'static str, Value)> {
        keys.iter()
            .find_map(|key| self.map.remove(*key).map(|value| (*key, value)))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Types that can be assembled from a frame's [`Fields`].
pub(crate) trait FromFields: Sized {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError>;
}

impl FromFields for RxContext {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            context: fields.field("rctx")?,
            xtime: fields.field("xtime")?,
            gpstime: fields.optional("gpstime")?,
        })
    }
}

impl FromFields for UpInfo {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            rssi: fields.field("rssi")?,
            snr: fields.field("snr")?,
            rx: RxContext::from_fields(fields)?,
        })
    }
}

impl FromFields for Version {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            station: fields.field("station")?,
            firmware: fields.field("firmware")?,
            package: fields.field("package")?,
            model: fields.field("model")?,
            protocol: fields.field("protocol")?,
            features: fields.field("features")?,
        })
    }
}

impl FromFields for JoinRequest {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            mhdr: fields.field("MHdr")?,
            join_eui: fields.field_any(JOIN_EUI_KEYS)?,
            dev_eui: fields.field_any(DEV_EUI_KEYS)?,
            dev_nonce: fields.field("DevNonce")?,
            mic: fields.field("MIC")?,
            data_rate: fields.field("DR")?,
            frequency: fields.field("Freq")?,
            up_info: UpInfo::from_fields(fields)?,
        })
    }
}

impl FromFields for Uplink {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            mhdr: fields.field("MHdr")?,
            dev_addr: fields.field("DevAddr")?,
            fctrl: fields.field("FCtrl")?,
            fcnt: fields.field("FCnt")?,
            fopts: fields.field("FOpts")?,
            fport: fields.field("FPort")?,
            frm_payload: fields.field("FRMPayload")?,
            mic: fields.field("MIC")?,
            data_rate: fields.field("DR")?,
            frequency: fields.field("Freq")?,
            up_info: UpInfo::from_fields(fields)?,
        })
    }
}

impl FromFields for DnTxed {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            downlink_id: fields.field("diid")?,
            dev_eui: fields.field_any(DEV_EUI_KEYS)?,
            tx_time: fields.field("txtime")?,
            rx: RxContext::from_fields(fields)?,
        })
    }
}

impl FromFields for Downlink {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            dev_eui: fields.optional_any(DEV_EUI_KEYS)?,
            device_class: fields.field("dC")?,
            downlink_id: fields.field("diid")?,
            pdu: fields.field("pdu")?,
            rx_delay: fields.field("RxDelay")?,
            rx1_data_rate: fields.optional("RX1DR")?,
            rx1_frequency: fields.optional("RX1Freq")?,
            rx2_data_rate: fields.optional("RX2DR")?,
            rx2_frequency: fields.optional("RX2Freq")?,
            priority: fields.field("priority")?,
            rx: RxContext::from_fields(fields)?,
        })
    }
}

impl FromFields for RouterConfig {
    fn from_fields(fields: &mut Fields) -> Result<Self, CodecError> {
        Ok(Self {
            region: fields.field("region")?,
            hwspec: fields.field("hwspec")?,
            data_rates: fields.field("DRs")?,
            net_ids: fields.field("NetID")?,
            join_eui_ranges: fields.field_any(JOIN_EUI_KEYS)?,
            freq_range: fields.optional("freq_range")?,
            sx1301_conf: fields.field_any(SX1301_KEYS)?,
            nocca: fields.field("nocca")?,
            nodc: fields.field("nodc")?,
            nodwell: fields.field("nodwell")?,
        })
    }
}
