//! FCJ Core - Value types for the file change journal
//!
//! This crate holds the plain data model shared by the journal and its
//! consumers:
//! - Snapshot hashes ([`hash::Hash`]) naming working-copy states
//! - Mount-relative paths ([`path::RelPath`]) with bytewise ordering
//! - Typed journal entries ([`delta::FileChangeDelta`],
//!   [`delta::HashUpdateDelta`]) and the per-path change normal form
//!   ([`delta::PathChangeInfo`])
//!
//! # Change normal form
//!
//! Every path touched by the journal is summarized as an existence
//! transition `(existed_before, existed_after)`:
//!
//! ```text
//! created = (false, true)
//! removed = (true, false)
//! changed = (true, true)
//! ```
//!
//! Transitions compose with [`delta::PathChangeInfo::chain`]: the older
//! transition contributes `existed_before`, the newer one `existed_after`.
//! Compaction in the delta store and accumulation in the range engine both
//! reduce to this one rule.

pub mod delta;
pub mod hash;
pub mod path;

// Re-export main types for convenience
pub use delta::{
    FileChangeDelta,
    FileChangeKind,
    HashUpdateDelta,
    PathChangeInfo,
    SequenceNumber,
};

pub use hash::Hash;

pub use path::{PathError, RelPath};
