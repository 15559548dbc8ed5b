//! Typed journal entries and the per-path change normal form.
//!
//! The journal records two kinds of entries: file-tree mutations
//! ([`FileChangeDelta`]) and working-copy snapshot transitions
//! ([`HashUpdateDelta`]). Both carry the journal-wide sequence number and a
//! monotonic timestamp assigned at append time.
//!
//! Every file-change entry carries an accumulated [`PathChangeInfo`] map so
//! that one entry can stand for a run of compacted events. The same
//! [`PathChangeInfo::chain`] rule is used when a new event is folded into an
//! existing entry and when the range engine merges entries into a summary.

use crate::hash::Hash;
use crate::path::RelPath;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::time::Instant;

/// Journal-wide sequence number.
///
/// The first assigned value is 1. Zero is never assigned; range queries use
/// it as the "from the beginning" sentinel.
pub type SequenceNumber = u64;

/// The kind of a single file-tree mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileChangeKind {
    /// The path did not exist and now exists.
    Created,
    /// The path existed and is now absent.
    Removed,
    /// The path existed and still exists; its content changed.
    Changed,
    /// The new name was created by a move from the old name.
    Renamed,
    /// The new name was overwritten by the contents at the old name.
    Replaced,
}

/// Existence transition for one path across a window of events.
///
/// created = `(false, true)`, removed = `(true, false)`,
/// changed = `(true, true)`. A `(false, false)` entry is a net no-op: the
/// path was created and removed within the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathChangeInfo {
    pub existed_before: bool,
    pub existed_after: bool,
}

impl PathChangeInfo {
    /// Transition for a path that came into existence.
    pub fn created() -> Self {
        PathChangeInfo {
            existed_before: false,
            existed_after: true,
        }
    }

    /// Transition for a path that went away.
    pub fn removed() -> Self {
        PathChangeInfo {
            existed_before: true,
            existed_after: false,
        }
    }

    /// Transition for a path whose content changed in place.
    pub fn changed() -> Self {
        PathChangeInfo {
            existed_before: true,
            existed_after: true,
        }
    }

    pub fn is_created(&self) -> bool {
        !self.existed_before && self.existed_after
    }

    pub fn is_removed(&self) -> bool {
        self.existed_before && !self.existed_after
    }

    pub fn is_modified(&self) -> bool {
        self.existed_before && self.existed_after
    }

    /// True when the window saw the path appear and disappear again.
    pub fn is_net_noop(&self) -> bool {
        !self.existed_before && !self.existed_after
    }

    /// Compose this transition with a newer one for the same path.
    ///
    /// The result keeps this transition's starting existence and takes the
    /// newer transition's final existence, so `created.chain(removed)` is a
    /// net no-op and `removed.chain(created)` is a change.
    pub fn chain(self, newer: PathChangeInfo) -> PathChangeInfo {
        PathChangeInfo {
            existed_before: self.existed_before,
            existed_after: newer.existed_after,
        }
    }
}

/// Fixed accounting cost per map/set node beyond the path bytes themselves.
const PATH_NODE_OVERHEAD: usize = mem::size_of::<RelPath>() + mem::size_of::<PathChangeInfo>();

/// A recorded file-tree mutation.
///
/// A freshly recorded delta describes exactly one event; after compaction a
/// single delta can stand for a run of events, with `changed_paths` holding
/// the accumulated per-path transitions. `kind`, `path1`, and `path2` always
/// describe the first event the entry was created from.
#[derive(Clone, Debug)]
pub struct FileChangeDelta {
    pub sequence: SequenceNumber,
    pub timestamp: Instant,
    pub kind: FileChangeKind,
    pub path1: RelPath,
    pub path2: Option<RelPath>,
    /// Accumulated transitions for every path this entry touches.
    pub changed_paths: BTreeMap<RelPath, PathChangeInfo>,
}

impl FileChangeDelta {
    /// Entry for a path that came into existence.
    pub fn created(path: RelPath) -> Self {
        let changed_paths = BTreeMap::from([(path.clone(), PathChangeInfo::created())]);
        Self::single(FileChangeKind::Created, path, None, changed_paths)
    }

    /// Entry for a path that went away.
    pub fn removed(path: RelPath) -> Self {
        let changed_paths = BTreeMap::from([(path.clone(), PathChangeInfo::removed())]);
        Self::single(FileChangeKind::Removed, path, None, changed_paths)
    }

    /// Entry for an in-place content change.
    pub fn changed(path: RelPath) -> Self {
        let changed_paths = BTreeMap::from([(path.clone(), PathChangeInfo::changed())]);
        Self::single(FileChangeKind::Changed, path, None, changed_paths)
    }

    /// Entry for a move: `new_path` was created by the move, `old_path` is gone.
    pub fn renamed(old_path: RelPath, new_path: RelPath) -> Self {
        let changed_paths = BTreeMap::from([
            (old_path.clone(), PathChangeInfo::removed()),
            (new_path.clone(), PathChangeInfo::created()),
        ]);
        Self::single(FileChangeKind::Renamed, old_path, Some(new_path), changed_paths)
    }

    /// Entry for a move over an existing file: `new_path` existed and was
    /// overwritten by the contents at `old_path`, which is gone.
    pub fn replaced(old_path: RelPath, new_path: RelPath) -> Self {
        let changed_paths = BTreeMap::from([
            (old_path.clone(), PathChangeInfo::removed()),
            (new_path.clone(), PathChangeInfo::changed()),
        ]);
        Self::single(FileChangeKind::Replaced, old_path, Some(new_path), changed_paths)
    }

    fn single(
        kind: FileChangeKind,
        path1: RelPath,
        path2: Option<RelPath>,
        changed_paths: BTreeMap<RelPath, PathChangeInfo>,
    ) -> Self {
        FileChangeDelta {
            sequence: 0,
            timestamp: Instant::now(),
            kind,
            path1,
            path2,
            changed_paths,
        }
    }

    /// Number of paths this entry touches (accumulated across compaction).
    pub fn path_count(&self) -> usize {
        self.changed_paths.len()
    }

    /// Fold a newer delta into this one, chaining per-path transitions.
    ///
    /// Paths whose composed transition is a net no-op are dropped, so a
    /// create followed by a remove leaves no trace in the merged entry.
    pub fn absorb(&mut self, newer: &FileChangeDelta) {
        for (path, info) in &newer.changed_paths {
            match self.changed_paths.entry(path.clone()) {
                Entry::Occupied(mut entry) => {
                    let merged = entry.get().chain(*info);
                    if merged.is_net_noop() {
                        entry.remove();
                    } else {
                        entry.insert(merged);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(*info);
                }
            }
        }
    }

    /// Conservative estimate of the bytes this entry keeps alive.
    ///
    /// Monotone in content size and reproducible, not byte-exact.
    pub fn estimate_memory_usage(&self) -> usize {
        let mut total = mem::size_of::<Self>();
        total += self.path1.heap_bytes();
        if let Some(path) = &self.path2 {
            total += path.heap_bytes();
        }
        for path in self.changed_paths.keys() {
            total += PATH_NODE_OVERHEAD + path.heap_bytes();
        }
        total
    }
}

/// A recorded working-copy snapshot transition (a checkout).
#[derive(Clone, Debug)]
pub struct HashUpdateDelta {
    pub sequence: SequenceNumber,
    pub timestamp: Instant,
    pub from_hash: Hash,
    pub to_hash: Hash,
    /// Paths known to carry local modifications at transition time.
    pub unclean_paths: BTreeSet<RelPath>,
}

impl HashUpdateDelta {
    /// A clean transition between two snapshots.
    pub fn new(from_hash: Hash, to_hash: Hash) -> Self {
        Self::with_unclean_paths(from_hash, to_hash, BTreeSet::new())
    }

    /// A transition carrying the set of locally modified paths.
    pub fn with_unclean_paths(
        from_hash: Hash,
        to_hash: Hash,
        unclean_paths: BTreeSet<RelPath>,
    ) -> Self {
        HashUpdateDelta {
            sequence: 0,
            timestamp: Instant::now(),
            from_hash,
            to_hash,
            unclean_paths,
        }
    }

    /// Conservative estimate of the bytes this entry keeps alive.
    pub fn estimate_memory_usage(&self) -> usize {
        let mut total = mem::size_of::<Self>();
        for path in &self.unclean_paths {
            total += mem::size_of::<RelPath>() + path.heap_bytes();
        }
        total
    }
}
