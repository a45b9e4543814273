//! Error types for the message codec.
//!
//! Decoding untrusted frames can fail at three layers:
//!
//! - the payload is not a JSON object at all ([`CodecError::Json`]);
//! - the `msgtype` discriminator is missing, not a string, or names a variant
//!   this crate does not support;
//! - a field of the selected variant has the wrong type or range
//!   ([`CodecError::Field`], which names the offending field).
//!
//! All decode errors are scoped to a single frame. A session that receives one
//! counts it and keeps reading; see [`CodecError::is_fatal`].

use thiserror::Error;

/// Errors raised while decoding or encoding protocol messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not a well-formed JSON object.
    #[error("malformed JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The object has no `msgtype` field.
    #[error("no msgtype in message")]
    MissingMessageType,

    /// The `msgtype` field holds something other than a string.
    #[error("msgtype is not a string: found {found}")]
    MessageTypeNotString {
        /// JSON type of the value found instead.
        found: &'static str,
    },

    /// The `msgtype` value names no supported variant.
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    /// A field could not be converted to its declared type.
    #[error("invalid value for field {field}: {source}")]
    Field {
        /// Wire name of the field.
        field: &'static str,
        /// Conversion failure reported by `serde_json`.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// Return the error category as a string for logging and metrics.
    ///
    /// One of `"json"`, `"msgtype"`, `"field"` or `"encode"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::MissingMessageType
            | Self::MessageTypeNotString { .. }
            | Self::UnsupportedMessageType(_) => "msgtype",
            Self::Field { .. } => "field",
            Self::Encode(_) => "encode",
        }
    }

    /// Returns `true` if the error should end the connection.
    ///
    /// Decode failures only ever cost the offending frame. Encode failures
    /// mean the server built a message it cannot send, which the caller must
    /// handle.
    #[must_use]
    pub fn is_fatal(&self) -> bool { matches!(self, Self::Encode(_)) }
}
