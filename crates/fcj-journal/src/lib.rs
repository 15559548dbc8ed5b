//! FCJ Journal - Bounded in-memory log of working-copy change events
//!
//! The journal records how a projected working copy changes over time:
//! file-tree mutations interleaved with snapshot transitions (checkouts).
//! Consumers query the tip, summarize everything since a sequence number,
//! enumerate raw entries for debugging, or subscribe to change
//! notifications.
//!
//! # Guarantees
//!
//! - Sequence numbers are gapless and strictly increasing; compacting a new
//!   event into an existing entry consumes no sequence number.
//! - The current hash always equals the `to_hash` of the newest snapshot
//!   transition, or zero before any.
//! - Memory is bounded: once retained entries exceed the configured budget
//!   the oldest are discarded, and range queries that reach past the
//!   discarded window report `is_truncated` instead of silently shrinking.
//! - Subscribers run on the recording thread with no journal lock held, so
//!   they may re-enter the journal; a panicking subscriber is contained.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fcj_core::Hash;
//! use fcj_journal::{Journal, JournalTelemetry};
//!
//! let journal = Journal::new(Arc::new(JournalTelemetry::new()));
//! journal.record_created("src/lib.rs".parse().unwrap());
//! journal.record_hash_update(Hash::for_rev("rev-1"));
//! journal.record_changed("src/lib.rs".parse().unwrap());
//!
//! let range = journal.accumulate_range(0).unwrap();
//! assert_eq!(range.snapshot_transitions.len(), 1);
//! assert_eq!(range.created_files().count(), 1);
//! ```

pub mod journal;
pub mod range;
pub mod store;
pub mod subscribers;
pub mod telemetry;

// Re-export main types for convenience
pub use journal::{Journal, JournalConfig, JournalDeltaInfo};

pub use range::{DebugDeltaRecord, DebugJournalDelta, DeltaRange, SnapshotTransition};

pub use store::{JournalStats, DEFAULT_JOURNAL_MEMORY_LIMIT};

pub use subscribers::{SubscriberCallback, SubscriberId};

pub use telemetry::{JournalTelemetry, TelemetrySnapshot};
