//! Per-session transport statistics.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;

use crate::message::MessageKind;

/// Counters accumulated over the lifetime of one session.
///
/// Counters are updated from both the receive and send paths without
/// coordination; each counter is individually atomic.
#[derive(Debug, Default)]
pub struct SessionStats {
    decode_errors: AtomicU64,
    recv_text: AtomicU64,
    recv_binary: AtomicU64,
    write_ok: AtomicU64,
    write_err: AtomicU64,
    write_no_conn: AtomicU64,
    by_kind: DashMap<MessageKind, u64>,
}

impl SessionStats {
    pub(crate) fn record_text(&self) { self.recv_text.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn record_binary(&self) { self.recv_binary.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_kind(&self, kind: MessageKind) {
        *self.by_kind.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn record_write_ok(&self) { self.write_ok.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn record_write_err(&self) { self.write_err.fetch_add(1, Ordering::Relaxed); }

    /// A write with no bound connection counts as a failed write too.
    pub(crate) fn record_write_no_conn(&self) {
        self.write_no_conn.fetch_add(1, Ordering::Relaxed);
        self.record_write_err();
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            recv_text: self.recv_text.load(Ordering::Relaxed),
            recv_binary: self.recv_binary.load(Ordering::Relaxed),
            write_ok: self.write_ok.load(Ordering::Relaxed),
            write_err: self.write_err.load(Ordering::Relaxed),
            write_no_conn: self.write_no_conn.load(Ordering::Relaxed),
            by_kind: self
                .by_kind
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Text frames that failed to decode.
    pub decode_errors: u64,
    /// Text frames received, including those that failed to decode.
    pub recv_text: u64,
    /// Binary frames received.
    pub recv_binary: u64,
    /// Frames written successfully.
    pub write_ok: u64,
    /// Writes that failed, including those with no connection.
    pub write_err: u64,
    /// Writes attempted while no connection was bound.
    pub write_no_conn: u64,
    /// Decoded text frames by message kind.
    pub by_kind: BTreeMap<MessageKind, u64>,
}

impl StatsSnapshot {
    /// Number of decoded frames of `kind`.
    #[must_use]
    pub fn count(&self, kind: MessageKind) -> u64 { self.by_kind.get(&kind).copied().unwrap_or(0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_connection_counts_as_failed_write() {
        let stats = SessionStats::default();
        stats.record_write_ok();
        stats.record_write_no_conn();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.write_ok, 1);
        assert_eq!(snapshot.write_err, 1);
        assert_eq!(snapshot.write_no_conn, 1);
    }

    #[test]
    fn kinds_are_counted_separately() {
        let stats = SessionStats::default();
        stats.record_kind(MessageKind::Uplink);
        stats.record_kind(MessageKind::Uplink);
        stats.record_kind(MessageKind::JoinRequest);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.count(MessageKind::Uplink), 2);
        assert_eq!(snapshot.count(MessageKind::JoinRequest), 1);
        assert_eq!(snapshot.count(MessageKind::DnTxed), 0);
    }
}
