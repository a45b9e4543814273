//! Station identifiers.
//!
//! An [`Eui`] is the 64-bit identifier a Basic Station gateway uses to name
//! itself. Stations are inconsistent about how they spell it: discovery
//! requests may carry a JSON number, a bare hex string, hyphen- or
//! colon-separated octets, or the "ID6" notation borrowed from IPv6 literals
//! (`1`, `1:2:3:4`). [`Eui::parse_str`] and [`Eui::parse_value`] accept all of
//! them. The canonical form written back to stations is always sixteen
//! lowercase hex digits without separators.

use std::{fmt, net::Ipv6Addr, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Number, Value};
use thiserror::Error;

/// Number of hex digits in the canonical textual form.
pub const EUI_HEX_LEN: usize = 16;

/// Separators stripped, in order, when parsing octet notation.
const SEPARATORS: [Option<char>; 3] = [None, Some('-'), Some(':')];

/// Errors raised while parsing a station identifier.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EuiError {
    /// The string matched none of the accepted notations.
    #[error("invalid EUI format: {0:?}")]
    InvalidFormat(String),
    /// A JSON number was negative.
    #[error("EUI must not be negative: {0}")]
    Negative(i64),
    /// A JSON float had a fractional part, was not finite, or exceeded 64 bits.
    #[error("EUI must be an integral value within 64 bits: {0}")]
    NotIntegral(f64),
    /// The JSON value was neither a string nor a number.
    #[error("EUI cannot be parsed from a JSON {0}")]
    UnsupportedType(&'static str),
}

/// 64-bit station identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Eui(u64);

impl Eui {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    /// Return the raw 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 { self.0 }

    /// Parse an identifier from any of the textual notations stations use.
    ///
    /// ID6 notation is tried first and accepted only when the trailing eight
    /// bytes are non-zero. Otherwise the string is stripped of each separator
    /// in turn (none, `-`, `:`) and must leave exactly sixteen hex digits.
    ///
    /// ```
    /// use basicstation::eui::Eui;
    ///
    /// let expected = Eui::new(0x0102_0304_0506_0708);
    /// assert_eq!(Eui::parse_str("0102030405060708"), Ok(expected));
    /// assert_eq!(Eui::parse_str("01-02-03-04-05-06-07-08"), Ok(expected));
    /// assert_eq!(Eui::parse_str("01:02:03:04:05:06:07:08"), Ok(expected));
    /// assert_eq!(Eui::parse_str("1"), Ok(Eui::new(1)));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`EuiError::InvalidFormat`] if no notation matches.
    pub fn parse_str(s: &str) -> Result<Self, EuiError> {
        let s = s.trim();
        if let Some(eui) = parse_id6(s) {
            return Ok(eui);
        }
        SEPARATORS
            .iter()
            .find_map(|sep| parse_hex(&strip(s, *sep)))
            .ok_or_else(|| EuiError::InvalidFormat(s.to_owned()))
    }

    /// Parse an identifier from a decoded JSON value.
    ///
    /// Integers are accepted directly. Floats are accepted only when they are
    /// finite, non-negative, integral and fit in 64 bits; anything that would
    /// be silently truncated is rejected.
    ///
    /// # Errors
    ///
    /// Returns an [`EuiError`] describing why the value was rejected.
    pub fn parse_value(value: &Value) -> Result<Self, EuiError> {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Number(n) => from_number(n),
            Value::Null => Err(EuiError::UnsupportedType("null")),
            Value::Bool(_) => Err(EuiError::UnsupportedType("bool")),
            Value::Array(_) => Err(EuiError::UnsupportedType("array")),
            Value::Object(_) => Err(EuiError::UnsupportedType("object")),
        }
    }
}

fn strip(s: &str, sep: Option<char>) -> String {
    match sep {
        Some(sep) => s.chars().filter(|c| *c != sep).collect(),
        None => s.to_owned(),
    }
}

fn parse_hex(digits: &str) -> Option<Eui> {
    if digits.len() != EUI_HEX_LEN || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok().map(Eui)
}

fn parse_id6(s: &str) -> Option<Eui> {
    let addr: Ipv6Addr = format!("::{s}").parse().ok()?;
    let octets = addr.octets();
    let mut tail = [0_u8; 8];
    tail.copy_from_slice(&octets[8..]);
    let raw = u64::from_be_bytes(tail);
    (raw != 0).then_some(Eui(raw))
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "range and integrality are checked before the cast"
)]
fn from_number(n: &Number) -> Result<Eui, EuiError> {
    if let Some(raw) = n.as_u64() {
        return Ok(Eui(raw));
    }
    if let Some(raw) = n.as_i64() {
        return Err(EuiError::Negative(raw));
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 {
        Ok(Eui(f as u64))
    } else {
        Err(EuiError::NotIntegral(f))
    }
}

impl fmt::Display for Eui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:016x}", self.0) }
}

impl FromStr for Eui {
    type Err = EuiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse_str(s) }
}

impl From<u64> for Eui {
    fn from(raw: u64) -> Self { Self(raw) }
}

impl From<Eui> for u64 {
    fn from(eui: Eui) -> Self { eui.0 }
}

impl Serialize for Eui {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Eui {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::parse_value(&value).map_err(de::Error::custom)
    }
}
