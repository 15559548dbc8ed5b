//! Range accumulation and raw debug enumeration.
//!
//! Both walks visit retained entries newest-first, interleaving the two
//! deques in descending sequence order. Accumulation merges file-change
//! entries with the same [`PathChangeInfo::chain`] rule the store uses for
//! compaction, just applied in the older direction: an older entry
//! contributes each path's starting existence, the newer accumulated state
//! keeps the final existence.

use crate::store::DeltaState;
use fcj_core::delta::{
    FileChangeDelta, FileChangeKind, HashUpdateDelta, PathChangeInfo, SequenceNumber,
};
use fcj_core::hash::Hash;
use fcj_core::path::RelPath;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// One snapshot transition observed inside an accumulated range.
#[derive(Clone, Debug)]
pub struct SnapshotTransition {
    pub from_hash: Hash,
    pub to_hash: Hash,
    pub sequence: SequenceNumber,
    pub unclean_paths: BTreeSet<RelPath>,
}

/// The merged summary of every retained entry at or after a limit sequence.
#[derive(Clone, Debug)]
pub struct DeltaRange {
    /// Oldest visited sequence number.
    pub from_sequence: SequenceNumber,

    /// Newest visited sequence number.
    pub to_sequence: SequenceNumber,

    pub from_time: Instant,
    pub to_time: Instant,

    /// Snapshot hash at the start of the range.
    pub from_hash: Hash,

    /// Snapshot hash at the end of the range (the current hash).
    pub to_hash: Hash,

    /// Merged per-path transitions across the whole range.
    pub changed_paths: BTreeMap<RelPath, PathChangeInfo>,

    /// Union of unclean paths across every transition in the range.
    pub unclean_paths: BTreeSet<RelPath>,

    /// Set when the query reached back past the oldest retained entry.
    pub is_truncated: bool,

    /// Snapshot transitions inside the range, newest first.
    pub snapshot_transitions: Vec<SnapshotTransition>,
}

impl DeltaRange {
    /// Paths that did not exist before the range and exist after it.
    pub fn created_files(&self) -> impl Iterator<Item = &RelPath> {
        self.changed_paths
            .iter()
            .filter(|(_, info)| info.is_created())
            .map(|(path, _)| path)
    }

    /// Paths that existed before the range and are gone after it.
    pub fn removed_files(&self) -> impl Iterator<Item = &RelPath> {
        self.changed_paths
            .iter()
            .filter(|(_, info)| info.is_removed())
            .map(|(path, _)| path)
    }

    /// Paths that existed throughout the range and changed in place.
    pub fn modified_files(&self) -> impl Iterator<Item = &RelPath> {
        self.changed_paths
            .iter()
            .filter(|(_, info)| info.is_modified())
            .map(|(path, _)| path)
    }
}

/// One raw journal entry, for introspection.
#[derive(Clone, Debug)]
pub struct DebugJournalDelta {
    /// Caller-supplied generation so debug consumers can tell journal
    /// incarnations apart across daemon restarts.
    pub mount_generation: u64,

    pub sequence: SequenceNumber,
    pub timestamp: Instant,

    /// Snapshot hash in effect before this entry. Equal to `to_hash` for
    /// file-change entries.
    pub from_hash: Hash,

    /// Snapshot hash in effect after this entry.
    pub to_hash: Hash,

    pub record: DebugDeltaRecord,
}

/// The payload of a raw journal entry.
#[derive(Clone, Debug)]
pub enum DebugDeltaRecord {
    FileChange {
        kind: FileChangeKind,
        path1: RelPath,
        path2: Option<RelPath>,
        changed_paths: BTreeMap<RelPath, PathChangeInfo>,
    },
    HashUpdate {
        unclean_paths: BTreeSet<RelPath>,
    },
}

/// A borrowed view of either entry kind during a walk.
enum DeltaRef<'a> {
    FileChange(&'a FileChangeDelta),
    HashUpdate(&'a HashUpdateDelta),
}

/// Visit retained entries with `sequence >= from`, newest first, at most
/// `length_limit` of them.
fn for_each_delta(
    state: &DeltaState,
    from: SequenceNumber,
    length_limit: Option<usize>,
    mut visit: impl FnMut(DeltaRef<'_>),
) {
    let mut fc_iter = state.file_change_deltas.iter().rev().peekable();
    let mut hu_iter = state.hash_update_deltas.iter().rev().peekable();
    let mut visited = 0usize;
    loop {
        if let Some(limit) = length_limit {
            if visited >= limit {
                break;
            }
        }
        let take_file_change = match (fc_iter.peek(), hu_iter.peek()) {
            (Some(fc), Some(hu)) => fc.sequence > hu.sequence,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        if take_file_change {
            match fc_iter.next() {
                Some(fc) if fc.sequence >= from => visit(DeltaRef::FileChange(fc)),
                _ => break,
            }
        } else {
            match hu_iter.next() {
                Some(hu) if hu.sequence >= from => visit(DeltaRef::HashUpdate(hu)),
                _ => break,
            }
        }
        visited += 1;
    }
}

/// Merge an older entry's transitions beneath the accumulated newer state.
fn merge_older_paths(
    acc: &mut BTreeMap<RelPath, PathChangeInfo>,
    older: &BTreeMap<RelPath, PathChangeInfo>,
) {
    for (path, older_info) in older {
        match acc.entry(path.clone()) {
            Entry::Occupied(mut entry) => {
                let merged = older_info.chain(*entry.get());
                entry.insert(merged);
            }
            Entry::Vacant(entry) => {
                entry.insert(*older_info);
            }
        }
    }
}

/// Summarize every retained entry with `sequence >= limit_sequence`.
///
/// Returns `None` iff no retained entry matches. A limit of 0 means "all".
pub(crate) fn accumulate_range(
    state: &DeltaState,
    limit_sequence: SequenceNumber,
) -> Option<DeltaRange> {
    let newest_sequence = state.back_sequence()?;
    if newest_sequence < limit_sequence {
        return None;
    }
    let newest_time = state.back_timestamp()?;
    let mut range = DeltaRange {
        from_sequence: newest_sequence,
        to_sequence: newest_sequence,
        from_time: newest_time,
        to_time: newest_time,
        from_hash: state.current_hash,
        to_hash: state.current_hash,
        changed_paths: BTreeMap::new(),
        unclean_paths: BTreeSet::new(),
        is_truncated: false,
        snapshot_transitions: Vec::new(),
    };
    for_each_delta(state, limit_sequence, None, |delta| match delta {
        DeltaRef::FileChange(fc) => {
            merge_older_paths(&mut range.changed_paths, &fc.changed_paths);
            range.from_sequence = fc.sequence;
            range.from_time = fc.timestamp;
        }
        DeltaRef::HashUpdate(hu) => {
            range.snapshot_transitions.push(SnapshotTransition {
                from_hash: hu.from_hash,
                to_hash: hu.to_hash,
                sequence: hu.sequence,
                unclean_paths: hu.unclean_paths.clone(),
            });
            range.unclean_paths.extend(hu.unclean_paths.iter().cloned());
            range.from_hash = hu.from_hash;
            range.from_sequence = hu.sequence;
            range.from_time = hu.timestamp;
        }
    });
    // The range reaches past the retained window when entries older than the
    // limit have been discarded. Sequence 1 is the journal's true beginning,
    // so a limit of 0 or 1 is only truncated once entry 1 itself is gone.
    if let Some(oldest) = state.front_sequence() {
        range.is_truncated = oldest > limit_sequence.max(1);
    }
    Some(range)
}

/// Enumerate raw entries with `sequence >= from`, newest first, at most
/// `limit` of them.
pub(crate) fn debug_raw_journal_info(
    state: &DeltaState,
    from: SequenceNumber,
    limit: Option<usize>,
    mount_generation: u64,
) -> Vec<DebugJournalDelta> {
    let mut entries = Vec::new();
    // Walking newest-first, the hash in effect at each file-change entry is
    // the from_hash of the nearest newer snapshot transition.
    let mut hash_cursor = state.current_hash;
    for_each_delta(state, from, limit, |delta| match delta {
        DeltaRef::FileChange(fc) => {
            entries.push(DebugJournalDelta {
                mount_generation,
                sequence: fc.sequence,
                timestamp: fc.timestamp,
                from_hash: hash_cursor,
                to_hash: hash_cursor,
                record: DebugDeltaRecord::FileChange {
                    kind: fc.kind,
                    path1: fc.path1.clone(),
                    path2: fc.path2.clone(),
                    changed_paths: fc.changed_paths.clone(),
                },
            });
        }
        DeltaRef::HashUpdate(hu) => {
            entries.push(DebugJournalDelta {
                mount_generation,
                sequence: hu.sequence,
                timestamp: hu.timestamp,
                from_hash: hu.from_hash,
                to_hash: hu.to_hash,
                record: DebugDeltaRecord::HashUpdate {
                    unclean_paths: hu.unclean_paths.clone(),
                },
            });
            hash_cursor = hu.from_hash;
        }
    });
    entries
}
