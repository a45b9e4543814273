//! Metric helpers for `basicstation`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops; per-session statistics are kept
//! either way.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live station sessions.
pub const SESSIONS_ACTIVE: &str = "basicstation_sessions_active";
/// Name of the counter tracking protocol frames.
pub const FRAMES_TOTAL: &str = "basicstation_frames_total";
/// Name of the counter tracking frames that failed to decode.
pub const DECODE_ERRORS_TOTAL: &str = "basicstation_decode_errors_total";

/// Direction of a protocol frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received from a station.
    Inbound,
    /// Frames sent to a station.
    Outbound,
}

impl Direction {
    /// Label value used for this direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a frame of the given kind.
///
/// `kind` is a `msgtype` value, or `binary`/`discovery` for frames without
/// one.
pub fn inc_frames(direction: Direction, kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str(), "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = (direction, kind);
}

/// Record a frame that failed to decode.
pub fn inc_decode_errors(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(DECODE_ERRORS_TOTAL, "error_type" => error_type).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = error_type;
}
