//! The delta store: dual deques, sequence assignment, compaction, truncation.
//!
//! Entries live in two deques, one per kind, with newer entries at the back.
//! Keeping the kinds separate lets a new entry be compacted against the
//! newest entry of its own kind in O(1), while the global order is still
//! recoverable by comparing sequence numbers at the deque ends.

use fcj_core::delta::{FileChangeDelta, HashUpdateDelta, SequenceNumber};
use fcj_core::hash::Hash;
use std::collections::VecDeque;
use std::time::Instant;

/// Default memory budget for retained deltas: 1 GB.
pub const DEFAULT_JOURNAL_MEMORY_LIMIT: usize = 1_000_000_000;

/// Statistics about the retained window of a journal.
#[derive(Clone, Debug)]
pub struct JournalStats {
    /// Total entries across both kinds.
    pub entry_count: usize,

    /// Timestamp of the oldest retained entry.
    pub earliest_timestamp: Instant,

    /// Timestamp of the newest entry.
    pub latest_timestamp: Instant,

    /// Largest number of paths any single retained entry has accumulated.
    pub max_files_accumulated: usize,
}

impl JournalStats {
    /// Seconds elapsed since the earliest retained entry.
    pub fn duration_in_seconds(&self) -> u64 {
        self.earliest_timestamp.elapsed().as_secs()
    }
}

/// What happened to an append once the store is done with it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AppendOutcome {
    /// Sequence number of the entry now carrying the event.
    pub(crate) sequence: SequenceNumber,

    /// Whether the event was folded into an existing entry.
    pub(crate) compacted: bool,

    /// Entries discarded by the truncation pass that followed the append.
    pub(crate) entries_dropped: usize,
}

/// The locked interior of a journal.
pub(crate) struct DeltaState {
    /// Sequence number the next appended entry will receive.
    pub(crate) next_sequence: SequenceNumber,

    /// File-tree mutations, oldest at the front.
    pub(crate) file_change_deltas: VecDeque<FileChangeDelta>,

    /// Snapshot transitions, oldest at the front.
    pub(crate) hash_update_deltas: VecDeque<HashUpdateDelta>,

    /// `to_hash` of the newest snapshot transition, or zero before any.
    pub(crate) current_hash: Hash,

    /// Stats over the retained window; `None` iff the store is empty.
    pub(crate) stats: Option<JournalStats>,

    pub(crate) memory_limit: usize,
    pub(crate) delta_memory_usage: usize,
}

impl DeltaState {
    pub(crate) fn new(memory_limit: usize) -> Self {
        DeltaState {
            next_sequence: 1,
            file_change_deltas: VecDeque::new(),
            hash_update_deltas: VecDeque::new(),
            current_hash: Hash::ZERO,
            stats: None,
            memory_limit,
            delta_memory_usage: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.file_change_deltas.is_empty() && self.hash_update_deltas.is_empty()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.file_change_deltas.len() + self.hash_update_deltas.len()
    }

    /// Whether the globally oldest entry is a file change.
    fn is_file_change_in_front(&self) -> bool {
        match (self.file_change_deltas.front(), self.hash_update_deltas.front()) {
            (Some(fc), Some(hu)) => fc.sequence < hu.sequence,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Whether the globally newest entry is a file change.
    pub(crate) fn is_file_change_in_back(&self) -> bool {
        match (self.file_change_deltas.back(), self.hash_update_deltas.back()) {
            (Some(fc), Some(hu)) => fc.sequence > hu.sequence,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Sequence number of the globally oldest retained entry.
    pub(crate) fn front_sequence(&self) -> Option<SequenceNumber> {
        if self.is_empty() {
            None
        } else if self.is_file_change_in_front() {
            self.file_change_deltas.front().map(|d| d.sequence)
        } else {
            self.hash_update_deltas.front().map(|d| d.sequence)
        }
    }

    /// Timestamp of the globally oldest retained entry.
    fn front_timestamp(&self) -> Option<Instant> {
        if self.is_empty() {
            None
        } else if self.is_file_change_in_front() {
            self.file_change_deltas.front().map(|d| d.timestamp)
        } else {
            self.hash_update_deltas.front().map(|d| d.timestamp)
        }
    }

    /// Sequence number of the globally newest entry.
    pub(crate) fn back_sequence(&self) -> Option<SequenceNumber> {
        if self.is_empty() {
            None
        } else if self.is_file_change_in_back() {
            self.file_change_deltas.back().map(|d| d.sequence)
        } else {
            self.hash_update_deltas.back().map(|d| d.sequence)
        }
    }

    /// Timestamp of the globally newest entry.
    pub(crate) fn back_timestamp(&self) -> Option<Instant> {
        if self.is_empty() {
            None
        } else if self.is_file_change_in_back() {
            self.file_change_deltas.back().map(|d| d.timestamp)
        } else {
            self.hash_update_deltas.back().map(|d| d.timestamp)
        }
    }

    /// Append a file-tree mutation, compacting into the newest file-change
    /// entry when no snapshot transition has intervened.
    pub(crate) fn add_file_change(&mut self, mut delta: FileChangeDelta) -> AppendOutcome {
        let now = Instant::now();
        let compactable = self.is_file_change_in_back();
        let (sequence, compacted) = match self.file_change_deltas.back_mut() {
            // The newest entry overall is a file change: fold the event in.
            // The merged entry keeps its sequence number and takes the new
            // event's timestamp.
            Some(back) if compactable => {
                self.delta_memory_usage -= back.estimate_memory_usage();
                back.absorb(&delta);
                back.timestamp = now;
                self.delta_memory_usage += back.estimate_memory_usage();
                (back.sequence, true)
            }
            _ => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                delta.sequence = sequence;
                delta.timestamp = now;
                self.delta_memory_usage += delta.estimate_memory_usage();
                self.file_change_deltas.push_back(delta);
                (sequence, false)
            }
        };
        let files_accumulated = self
            .file_change_deltas
            .back()
            .map(|d| d.path_count())
            .unwrap_or(0);
        self.track_entry_stats(now, files_accumulated);
        let entries_dropped = self.truncate_if_necessary();
        AppendOutcome {
            sequence,
            compacted,
            entries_dropped,
        }
    }

    /// Append a snapshot transition, compacting into the newest hash-update
    /// entry when no file change has intervened. Always advances the current
    /// hash to the entry's `to_hash`.
    pub(crate) fn add_hash_update(&mut self, mut delta: HashUpdateDelta) -> AppendOutcome {
        let now = Instant::now();
        let new_hash = delta.to_hash;
        let compactable = !self.is_empty() && !self.is_file_change_in_back();
        let (sequence, compacted) = match self.hash_update_deltas.back_mut() {
            Some(back) if compactable => {
                self.delta_memory_usage -= back.estimate_memory_usage();
                back.to_hash = delta.to_hash;
                back.unclean_paths.append(&mut delta.unclean_paths);
                back.timestamp = now;
                self.delta_memory_usage += back.estimate_memory_usage();
                (back.sequence, true)
            }
            _ => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                delta.sequence = sequence;
                delta.timestamp = now;
                self.delta_memory_usage += delta.estimate_memory_usage();
                self.hash_update_deltas.push_back(delta);
                (sequence, false)
            }
        };
        self.current_hash = new_hash;
        self.track_entry_stats(now, 0);
        let entries_dropped = self.truncate_if_necessary();
        AppendOutcome {
            sequence,
            compacted,
            entries_dropped,
        }
    }

    fn track_entry_stats(&mut self, now: Instant, files_accumulated: usize) {
        let entry_count = self.entry_count();
        match &mut self.stats {
            Some(stats) => {
                stats.entry_count = entry_count;
                stats.latest_timestamp = now;
                stats.max_files_accumulated =
                    stats.max_files_accumulated.max(files_accumulated);
            }
            None => {
                self.stats = Some(JournalStats {
                    entry_count,
                    earliest_timestamp: now,
                    latest_timestamp: now,
                    max_files_accumulated: files_accumulated,
                });
            }
        }
    }

    /// Discard oldest entries until memory usage fits the limit.
    ///
    /// The sole remaining entry is never discarded, even when it alone
    /// exceeds the limit. Returns the number of entries dropped.
    pub(crate) fn truncate_if_necessary(&mut self) -> usize {
        let mut dropped = 0;
        while self.delta_memory_usage > self.memory_limit && self.entry_count() > 1 {
            let freed = if self.is_file_change_in_front() {
                self.file_change_deltas
                    .pop_front()
                    .map(|d| d.estimate_memory_usage())
            } else {
                self.hash_update_deltas
                    .pop_front()
                    .map(|d| d.estimate_memory_usage())
            };
            match freed {
                Some(bytes) => {
                    self.delta_memory_usage = self.delta_memory_usage.saturating_sub(bytes);
                    dropped += 1;
                }
                None => break,
            }
        }
        if dropped > 0 {
            let entry_count = self.entry_count();
            let front_timestamp = self.front_timestamp();
            if let Some(stats) = &mut self.stats {
                stats.entry_count = entry_count;
                if let Some(timestamp) = front_timestamp {
                    stats.earliest_timestamp = timestamp;
                }
            }
        }
        dropped
    }

    /// Drop every retained entry and reset stats and memory accounting.
    ///
    /// `next_sequence` and `current_hash` survive; sequence numbers stay
    /// unique for the life of the journal.
    pub(crate) fn clear_retained(&mut self) {
        self.file_change_deltas.clear();
        self.hash_update_deltas.clear();
        self.stats = None;
        self.delta_memory_usage = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcj_core::path::RelPath;

    fn rp(s: &str) -> RelPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_sequences_start_at_one() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        let outcome = state.add_file_change(FileChangeDelta::created(rp("a")));
        assert_eq!(outcome.sequence, 1);
        assert!(!outcome.compacted);
        assert_eq!(state.next_sequence, 2);
    }

    #[test]
    fn test_adjacent_file_changes_compact() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        state.add_file_change(FileChangeDelta::created(rp("a")));
        let outcome = state.add_file_change(FileChangeDelta::created(rp("b")));
        assert!(outcome.compacted);
        assert_eq!(outcome.sequence, 1);
        assert_eq!(state.entry_count(), 1);
        // The compacted entry consumed no extra sequence number.
        assert_eq!(state.next_sequence, 2);
    }

    #[test]
    fn test_hash_update_breaks_file_compaction() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        state.add_file_change(FileChangeDelta::created(rp("a")));
        state.add_hash_update(HashUpdateDelta::new(Hash::ZERO, Hash::for_rev("rev1")));
        let outcome = state.add_file_change(FileChangeDelta::created(rp("b")));
        assert!(!outcome.compacted);
        assert_eq!(outcome.sequence, 3);
        assert_eq!(state.entry_count(), 3);
    }

    #[test]
    fn test_adjacent_hash_updates_compact() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        let h1 = Hash::for_rev("rev1");
        let h2 = Hash::for_rev("rev2");
        state.add_hash_update(HashUpdateDelta::new(Hash::ZERO, h1));
        let outcome = state.add_hash_update(HashUpdateDelta::new(h1, h2));
        assert!(outcome.compacted);
        assert_eq!(state.entry_count(), 1);
        assert_eq!(state.current_hash, h2);
        let back = state.hash_update_deltas.back().unwrap();
        assert_eq!(back.from_hash, Hash::ZERO);
        assert_eq!(back.to_hash, h2);
    }

    #[test]
    fn test_truncation_pops_lowest_sequence_first() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        let h1 = Hash::for_rev("rev1");
        state.add_file_change(FileChangeDelta::created(rp("aa")));
        state.add_hash_update(HashUpdateDelta::new(Hash::ZERO, h1));
        state.add_file_change(FileChangeDelta::created(rp("bb")));
        assert_eq!(state.entry_count(), 3);

        state.memory_limit = 1;
        let dropped = state.truncate_if_necessary();
        assert_eq!(dropped, 2);
        assert_eq!(state.entry_count(), 1);
        assert_eq!(state.front_sequence(), Some(3));
    }

    #[test]
    fn test_sole_entry_survives_tiny_limit() {
        let mut state = DeltaState::new(1);
        state.add_file_change(FileChangeDelta::created(rp("a")));
        assert_eq!(state.entry_count(), 1);
        assert!(state.delta_memory_usage > state.memory_limit);
    }

    #[test]
    fn test_stats_track_window() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        assert!(state.stats.is_none());
        state.add_file_change(FileChangeDelta::created(rp("a")));
        state.add_file_change(FileChangeDelta::created(rp("b")));
        let stats = state.stats.as_ref().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.max_files_accumulated, 2);
        assert!(stats.latest_timestamp >= stats.earliest_timestamp);
    }

    #[test]
    fn test_clear_retained_preserves_sequence_and_hash() {
        let mut state = DeltaState::new(DEFAULT_JOURNAL_MEMORY_LIMIT);
        let h1 = Hash::for_rev("rev1");
        state.add_file_change(FileChangeDelta::created(rp("a")));
        state.add_hash_update(HashUpdateDelta::new(Hash::ZERO, h1));
        state.clear_retained();
        assert!(state.is_empty());
        assert!(state.stats.is_none());
        assert_eq!(state.delta_memory_usage, 0);
        assert_eq!(state.current_hash, h1);
        assert_eq!(state.next_sequence, 3);
    }
}
