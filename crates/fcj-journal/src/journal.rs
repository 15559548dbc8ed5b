//! The journal façade: record operations, queries, subscriptions.
//!
//! The journal answers questions about how the working copy has been
//! changing over time. It holds metadata only, never file content: enough
//! to answer "which paths changed between sequence A and now" and "which
//! snapshot transitions happened in between".
//!
//! The journal is thread-safe. All work runs on the caller's thread;
//! subscribers are invoked synchronously on the thread that recorded the
//! change, after every lock has been released.

use crate::range::{DebugJournalDelta, DeltaRange};
use crate::store::{AppendOutcome, DeltaState, JournalStats, DEFAULT_JOURNAL_MEMORY_LIMIT};
use crate::subscribers::{SubscriberId, SubscriberState};
use crate::telemetry::JournalTelemetry;
use fcj_core::delta::{FileChangeDelta, HashUpdateDelta, SequenceNumber};
use fcj_core::hash::Hash;
use fcj_core::path::RelPath;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Configuration for a journal instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Memory budget for retained entries, in accounted bytes.
    pub memory_limit: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            memory_limit: DEFAULT_JOURNAL_MEMORY_LIMIT,
        }
    }
}

/// Metadata of the newest journal entry.
#[derive(Clone, Copy, Debug)]
pub struct JournalDeltaInfo {
    pub from_hash: Hash,
    pub to_hash: Hash,
    pub sequence: SequenceNumber,
    pub timestamp: Instant,
}

/// An in-memory, bounded, append-only log of working-copy change events.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use fcj_journal::{Journal, JournalTelemetry};
///
/// let journal = Journal::new(Arc::new(JournalTelemetry::new()));
/// journal.record_created("src/lib.rs".parse().unwrap());
/// let range = journal.accumulate_range(0).unwrap();
/// assert_eq!(range.created_files().count(), 1);
/// ```
pub struct Journal {
    delta_state: RwLock<DeltaState>,
    subscriber_state: Mutex<SubscriberState>,
    telemetry: Arc<JournalTelemetry>,
}

impl Journal {
    /// Create an empty journal with the default memory limit.
    pub fn new(telemetry: Arc<JournalTelemetry>) -> Self {
        Self::with_config(telemetry, JournalConfig::default())
    }

    /// Create an empty journal with custom configuration.
    pub fn with_config(telemetry: Arc<JournalTelemetry>, config: JournalConfig) -> Self {
        Journal {
            delta_state: RwLock::new(DeltaState::new(config.memory_limit)),
            subscriber_state: Mutex::new(SubscriberState::new()),
            telemetry,
        }
    }

    /// The telemetry sink this journal reports into.
    pub fn telemetry(&self) -> &Arc<JournalTelemetry> {
        &self.telemetry
    }

    // ─── Recording ─────────────────────────────────────────────────────────

    /// Record that `path` did not exist and now exists.
    pub fn record_created(&self, path: RelPath) {
        self.add_file_change(FileChangeDelta::created(path));
    }

    /// Record that `path` existed and is now absent.
    pub fn record_removed(&self, path: RelPath) {
        self.add_file_change(FileChangeDelta::removed(path));
    }

    /// Record that the content at `path` changed in place.
    pub fn record_changed(&self, path: RelPath) {
        self.add_file_change(FileChangeDelta::changed(path));
    }

    /// Record a move: `new_path` was created by moving `old_path`.
    pub fn record_renamed(&self, old_path: RelPath, new_path: RelPath) {
        self.add_file_change(FileChangeDelta::renamed(old_path, new_path));
    }

    /// Record a move over an existing file: `new_path` was overwritten by
    /// the contents that were at `old_path`.
    pub fn record_replaced(&self, old_path: RelPath, new_path: RelPath) {
        self.add_file_change(FileChangeDelta::replaced(old_path, new_path));
    }

    /// Record a checkout to `to_hash`, chaining from the current hash.
    ///
    /// A no-op when `to_hash` already is the current hash.
    pub fn record_hash_update(&self, to_hash: Hash) {
        let outcome = {
            let mut state = self.delta_state.write();
            if to_hash == state.current_hash {
                return;
            }
            let from_hash = state.current_hash;
            state.add_hash_update(HashUpdateDelta::new(from_hash, to_hash))
        };
        self.finish_record(outcome);
    }

    /// Record a checkout from `from_hash` to `to_hash`.
    ///
    /// `from_hash` is expected to equal the current hash. A mismatch is
    /// counted and logged but never rejected: the entry is recorded with
    /// the caller's `from_hash` and the current hash advances to `to_hash`
    /// regardless, on the principle that losing an event is worse than
    /// refusing it.
    pub fn record_hash_transition(&self, from_hash: Hash, to_hash: Hash) {
        let outcome = {
            let mut state = self.delta_state.write();
            self.note_hash_mismatch(state.current_hash, from_hash);
            state.add_hash_update(HashUpdateDelta::new(from_hash, to_hash))
        };
        self.finish_record(outcome);
    }

    /// Record a checkout carrying the set of locally modified paths.
    ///
    /// A `from_hash` that does not chain from the current hash is handled
    /// the same way as in [`Journal::record_hash_transition`]: counted,
    /// logged, and recorded anyway.
    pub fn record_unclean_paths(
        &self,
        from_hash: Hash,
        to_hash: Hash,
        unclean_paths: BTreeSet<RelPath>,
    ) {
        let outcome = {
            let mut state = self.delta_state.write();
            self.note_hash_mismatch(state.current_hash, from_hash);
            state.add_hash_update(HashUpdateDelta::with_unclean_paths(
                from_hash,
                to_hash,
                unclean_paths,
            ))
        };
        self.finish_record(outcome);
    }

    /// Count and log a checkout whose `from_hash` does not chain from the
    /// current hash. Recording proceeds regardless.
    fn note_hash_mismatch(&self, current: Hash, given: Hash) {
        if given != current {
            self.telemetry.record_hash_mismatch();
            warn!(
                current = %current.short(),
                given = %given.short(),
                "hash transition does not chain from the current hash"
            );
        }
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    /// Metadata of the newest entry, or `None` when the journal is empty.
    ///
    /// For a file-change entry the reported hashes are both the current
    /// hash: no newer snapshot transition exists, so the current hash is
    /// also the hash in effect when the entry was recorded.
    pub fn get_latest(&self) -> Option<JournalDeltaInfo> {
        let state = self.delta_state.read();
        if state.is_empty() {
            return None;
        }
        if state.is_file_change_in_back() {
            state.file_change_deltas.back().map(|fc| JournalDeltaInfo {
                from_hash: state.current_hash,
                to_hash: state.current_hash,
                sequence: fc.sequence,
                timestamp: fc.timestamp,
            })
        } else {
            state.hash_update_deltas.back().map(|hu| JournalDeltaInfo {
                from_hash: hu.from_hash,
                to_hash: hu.to_hash,
                sequence: hu.sequence,
                timestamp: hu.timestamp,
            })
        }
    }

    /// Stats over the retained window, or `None` when the journal is empty.
    pub fn get_stats(&self) -> Option<JournalStats> {
        self.delta_state.read().stats.clone()
    }

    /// Summarize every retained entry with `sequence >= limit_sequence`.
    ///
    /// A limit of 0 means "everything retained". Returns `None` iff no
    /// entry matches. The result's `is_truncated` flag is set when entries
    /// the query asked for have already been discarded.
    pub fn accumulate_range(&self, limit_sequence: SequenceNumber) -> Option<DeltaRange> {
        let range = {
            let state = self.delta_state.read();
            crate::range::accumulate_range(&state, limit_sequence)
        };
        if let Some(range) = &range {
            if range.is_truncated {
                self.telemetry.record_truncated_read();
            }
        }
        range
    }

    /// Enumerate raw entries newest-first for debugging, starting at the
    /// newest and stopping below `from` or after `limit` entries.
    ///
    /// `mount_generation` is carried opaquely into every returned entry.
    pub fn debug_raw_journal_info(
        &self,
        from: SequenceNumber,
        limit: Option<usize>,
        mount_generation: u64,
    ) -> Vec<DebugJournalDelta> {
        let state = self.delta_state.read();
        crate::range::debug_raw_journal_info(&state, from, limit, mount_generation)
    }

    /// Accounted bytes currently retained.
    pub fn estimate_memory_usage(&self) -> usize {
        self.delta_state.read().delta_memory_usage
    }

    /// The memory budget for retained entries.
    pub fn get_memory_limit(&self) -> usize {
        self.delta_state.read().memory_limit
    }

    /// Change the memory budget. Lowering it truncates immediately.
    pub fn set_memory_limit(&self, bytes: usize) {
        let dropped = {
            let mut state = self.delta_state.write();
            state.memory_limit = bytes;
            state.truncate_if_necessary()
        };
        if dropped > 0 {
            self.telemetry.record_entries_truncated(dropped as u64);
            debug!(dropped, limit = bytes, "truncated after memory limit change");
        }
    }

    // ─── Subscribers ───────────────────────────────────────────────────────

    /// Register a callback invoked after every recorded change.
    ///
    /// Callbacks run synchronously on the recording thread and should do
    /// the minimum needed to schedule real work elsewhere; journal updates
    /// often happen mid-mutation in contexts where heavy lifting is
    /// inappropriate. The returned id can be passed to
    /// [`Journal::cancel_subscriber`].
    pub fn register_subscriber(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> SubscriberId {
        self.subscriber_state.lock().register(Arc::new(callback))
    }

    /// Remove a subscriber. Unknown ids are ignored. A callback already
    /// running on another thread completes; it is never invoked again.
    pub fn cancel_subscriber(&self, id: SubscriberId) {
        self.subscriber_state.lock().cancel(id);
    }

    pub fn cancel_all_subscribers(&self) {
        self.subscriber_state.lock().cancel_all();
    }

    pub fn is_subscriber_valid(&self, id: SubscriberId) -> bool {
        self.subscriber_state.lock().is_valid(id)
    }

    // ─── Maintenance ───────────────────────────────────────────────────────

    /// Drop all retained entries, then record a synthetic transition from
    /// the current hash to itself as the new tip.
    ///
    /// Sequence numbers and the current hash are preserved, so consumers
    /// that later call [`Journal::accumulate_range`] across the flush see
    /// an explicit truncation boundary rather than silently missing
    /// history. Subscribers are notified.
    pub fn flush(&self) {
        let outcome = {
            let mut state = self.delta_state.write();
            let hash = state.current_hash;
            let had_entries = !state.is_empty();
            state.clear_retained();
            debug!(had_entries, "flushed journal");
            state.add_hash_update(HashUpdateDelta::new(hash, hash))
        };
        self.finish_record(outcome);
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    fn add_file_change(&self, delta: FileChangeDelta) {
        let outcome = {
            let mut state = self.delta_state.write();
            state.add_file_change(delta)
        };
        self.finish_record(outcome);
    }

    /// Telemetry and notification for a completed append. Must be called
    /// with no journal lock held.
    fn finish_record(&self, outcome: AppendOutcome) {
        self.telemetry.record_delta();
        if outcome.entries_dropped > 0 {
            self.telemetry
                .record_entries_truncated(outcome.entries_dropped as u64);
            debug!(dropped = outcome.entries_dropped, "truncated oldest entries");
        }
        trace!(
            sequence = outcome.sequence,
            compacted = outcome.compacted,
            "recorded delta"
        );
        self.notify_subscribers();
    }

    /// Invoke every subscriber from a snapshot of the registry.
    ///
    /// The snapshot is taken under the registry lock alone and both locks
    /// are released before the first invocation, so callbacks are free to
    /// call back into the journal. A panicking callback is contained: it
    /// is counted, logged, and does not disturb the remaining callbacks.
    fn notify_subscribers(&self) {
        let callbacks = self.subscriber_state.lock().snapshot();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                self.telemetry.record_subscriber_panic();
                warn!("subscriber callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> Journal {
        Journal::new(Arc::new(JournalTelemetry::new()))
    }

    fn rp(s: &str) -> RelPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_journal_has_no_latest() {
        let journal = journal();
        assert!(journal.get_latest().is_none());
        assert!(journal.get_stats().is_none());
        assert!(journal.accumulate_range(0).is_none());
    }

    #[test]
    fn test_latest_for_file_change_uses_current_hash() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        journal.record_hash_update(h1);
        journal.record_created(rp("a"));
        let latest = journal.get_latest().unwrap();
        assert_eq!(latest.from_hash, h1);
        assert_eq!(latest.to_hash, h1);
        assert_eq!(latest.sequence, 2);
    }

    #[test]
    fn test_hash_update_to_current_hash_is_noop() {
        let journal = journal();
        journal.record_hash_update(Hash::ZERO);
        assert!(journal.get_latest().is_none());
        assert_eq!(journal.telemetry().snapshot().deltas_recorded, 0);
    }

    #[test]
    fn test_mismatched_transition_is_accepted_and_counted() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        let h2 = Hash::for_rev("rev2");
        journal.record_hash_transition(h1, h2);
        assert_eq!(journal.telemetry().snapshot().hash_mismatches, 1);
        let latest = journal.get_latest().unwrap();
        assert_eq!(latest.from_hash, h1);
        assert_eq!(latest.to_hash, h2);
        // The current hash advanced despite the broken chain.
        journal.record_hash_update(h2);
        assert_eq!(journal.get_latest().unwrap().to_hash, h2);
    }

    #[test]
    fn test_mismatched_unclean_paths_is_accepted_and_counted() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        let h2 = Hash::for_rev("rev2");
        journal.record_unclean_paths(h1, h2, BTreeSet::from([rp("dirty/file")]));
        assert_eq!(journal.telemetry().snapshot().hash_mismatches, 1);
        let latest = journal.get_latest().unwrap();
        assert_eq!(latest.from_hash, h1);
        assert_eq!(latest.to_hash, h2);
    }

    #[test]
    fn test_chained_unclean_paths_is_not_a_mismatch() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        journal.record_unclean_paths(Hash::ZERO, h1, BTreeSet::from([rp("dirty/file")]));
        assert_eq!(journal.telemetry().snapshot().hash_mismatches, 0);
        assert_eq!(journal.get_latest().unwrap().to_hash, h1);
    }

    #[test]
    fn test_flush_preserves_sequence_and_hash() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        journal.record_created(rp("a"));
        journal.record_hash_update(h1);
        journal.flush();
        let latest = journal.get_latest().unwrap();
        assert_eq!(latest.sequence, 3);
        assert_eq!(latest.from_hash, h1);
        assert_eq!(latest.to_hash, h1);
        let stats = journal.get_stats().unwrap();
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_memory_limit_roundtrip() {
        let journal = journal();
        assert_eq!(journal.get_memory_limit(), DEFAULT_JOURNAL_MEMORY_LIMIT);
        journal.set_memory_limit(4096);
        assert_eq!(journal.get_memory_limit(), 4096);
    }

    #[test]
    fn test_lowering_limit_truncates_immediately() {
        let journal = journal();
        let h1 = Hash::for_rev("rev1");
        journal.record_created(rp("aaaa"));
        journal.record_hash_update(h1);
        journal.record_created(rp("bbbb"));
        assert_eq!(journal.get_stats().unwrap().entry_count, 3);
        journal.set_memory_limit(1);
        assert_eq!(journal.get_stats().unwrap().entry_count, 1);
        assert!(journal.telemetry().snapshot().entries_truncated >= 2);
    }
}
