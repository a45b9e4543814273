//! JSON codec for Basic Station messages.
//!
//! Inbound frames are decoded in two phases. The payload is first parsed into
//! a generic JSON object so the `msgtype` discriminator can be inspected
//! without committing to a shape; the matching variant is then assembled field
//! by field. Missing or `null` fields take their type's default value, and
//! integers are converted without passing through `f64`, so a 32-bit
//! `DevAddr` of `-1` stays `-1`.
//!
//! Outbound messages are serialized directly from [`Message`], which carries
//! its own `msgtype` tag.
//!
//! # Error Handling
//!
//! Every decode failure is reported as a [`CodecError`] scoped to the frame
//! that caused it. See the [`error`] module for the taxonomy.

use serde::Serialize;

pub mod error;
mod fields;

pub use error::CodecError;
use fields::{Fields, FromFields};

use crate::message::{
    DnTxed,
    Downlink,
    JoinRequest,
    Message,
    MessageKind,
    RouterConfig,
    Uplink,
    Version,
};

/// Decode one inbound text frame.
///
/// Returns `Ok(None)` for message types that are recognised but deliberately
/// ignored (`propdf`).
///
/// ```
/// use basicstation::{codec, message::Message};
///
/// let frame = br#"{"msgtype":"updf","DevAddr":-1,"FPort":-1}"#;
/// let Some(Message::Uplink(uplink)) = codec::decode(frame)? else {
///     panic!("expected an uplink");
/// };
/// assert_eq!(uplink.dev_addr, -1);
/// # Ok::<(), codec::CodecError>(())
/// ```
///
/// # Errors
///
/// Returns a [`CodecError`] if the frame is not a JSON object, carries no
/// usable `msgtype`, or holds a field of the wrong type.
pub fn decode(bytes: &[u8]) -> Result<Option<Message>, CodecError> {
    let mut fields = Fields::parse(bytes)?;
    let message = match fields.message_kind()? {
        MessageKind::Proprietary => return Ok(None),
        MessageKind::Version => Message::Version(Version::from_fields(&mut fields)?),
        MessageKind::JoinRequest => Message::JoinRequest(JoinRequest::from_fields(&mut fields)?),
        MessageKind::Uplink => Message::Uplink(Uplink::from_fields(&mut fields)?),
        MessageKind::DnTxed => Message::DnTxed(DnTxed::from_fields(&mut fields)?),
        MessageKind::Downlink => Message::Downlink(Downlink::from_fields(&mut fields)?),
        MessageKind::RouterConfig => {
            Message::RouterConfig(RouterConfig::from_fields(&mut fields)?)
        }
    };
    Ok(Some(message))
}

/// Encode a message as a JSON text frame including its `msgtype`.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(message: &Message) -> Result<String, CodecError> { encode_json(message) }

/// Encode any serializable value as a JSON text frame.
///
/// Used for payloads that are not tagged messages, such as discovery
/// responses.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}
