//! Shared counters reported by the journal.
//!
//! A [`JournalTelemetry`] is handed to the journal at construction and is
//! expected to outlive it, typically shared with the host daemon's metrics
//! exporter. All counters are plain atomics, so the sink is safe to read
//! and write from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counter sink shared between a journal and its host process.
#[derive(Debug, Default)]
pub struct JournalTelemetry {
    deltas_recorded: AtomicU64,
    truncated_reads: AtomicU64,
    hash_mismatches: AtomicU64,
    entries_truncated: AtomicU64,
    subscriber_panics: AtomicU64,
}

impl JournalTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delta(&self) {
        self.deltas_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_truncated_read(&self) {
        self.truncated_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hash_mismatch(&self) {
        self.hash_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_entries_truncated(&self, entries: u64) {
        self.entries_truncated.fetch_add(entries, Ordering::Relaxed);
    }

    pub(crate) fn record_subscriber_panic(&self) {
        self.subscriber_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            deltas_recorded: self.deltas_recorded.load(Ordering::Relaxed),
            truncated_reads: self.truncated_reads.load(Ordering::Relaxed),
            hash_mismatches: self.hash_mismatches.load(Ordering::Relaxed),
            entries_truncated: self.entries_truncated.load(Ordering::Relaxed),
            subscriber_panics: self.subscriber_panics.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Record operations that produced or extended an entry.
    pub deltas_recorded: u64,

    /// Range reads that reached past the retained window.
    pub truncated_reads: u64,

    /// Hash transitions whose from-hash did not chain from the current hash.
    pub hash_mismatches: u64,

    /// Entries discarded by truncation passes.
    pub entries_truncated: u64,

    /// Subscriber callbacks that panicked and were contained.
    pub subscriber_panics: u64,
}
