//! Subscriber notification behavior: visibility, isolation, snapshot
//! semantics, and re-entrancy from inside a callback.

use fcj_core::hash::Hash;
use fcj_core::path::RelPath;
use fcj_journal::{Journal, JournalTelemetry};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

fn journal() -> Arc<Journal> {
    Arc::new(Journal::new(Arc::new(JournalTelemetry::new())))
}

fn rp(s: &str) -> RelPath {
    s.parse().unwrap()
}

#[test]
fn test_subscriber_fires_once_per_recorded_change() {
    let journal = journal();
    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    journal.register_subscriber(move || {
        count2.fetch_add(1, Ordering::SeqCst);
    });

    journal.record_created(rp("a"));
    journal.record_changed(rp("a"));
    journal.record_hash_update(Hash::for_rev("rev1"));
    assert_eq!(count.load(Ordering::SeqCst), 3);

    // A no-op hash update records nothing and notifies nobody.
    journal.record_hash_update(Hash::for_rev("rev1"));
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_subscriber_sees_the_delta_it_was_notified_for() {
    let journal = journal();
    let seen = Arc::new(AtomicU64::new(0));
    let seen2 = Arc::clone(&seen);
    let weak: Weak<Journal> = Arc::downgrade(&journal);
    journal.register_subscriber(move || {
        if let Some(journal) = weak.upgrade() {
            if let Some(latest) = journal.get_latest() {
                seen2.store(latest.sequence, Ordering::SeqCst);
            }
        }
    });

    journal.record_created(rp("a"));
    journal.record_hash_update(Hash::for_rev("rev1"));
    // The callback for the second record observed sequence 2 (or newer).
    assert!(seen.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_panicking_subscriber_does_not_stop_others() {
    let journal = journal();
    let count = Arc::new(AtomicUsize::new(0));
    journal.register_subscriber(|| panic!("subscriber bug"));
    let count2 = Arc::clone(&count);
    journal.register_subscriber(move || {
        count2.fetch_add(1, Ordering::SeqCst);
    });

    journal.record_created(rp("a"));
    journal.record_created(rp("b"));

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(journal.telemetry().snapshot().subscriber_panics, 2);
    // The journal itself is unharmed.
    assert!(journal.get_latest().is_some());
}

#[test]
fn test_cancel_from_inside_a_callback_stops_later_events() {
    let journal = journal();
    let s2_runs = Arc::new(AtomicUsize::new(0));
    let weak: Weak<Journal> = Arc::downgrade(&journal);
    let s2_id = Arc::new(Mutex::new(0u64));

    let s2_id2 = Arc::clone(&s2_id);
    journal.register_subscriber(move || {
        if let Some(journal) = weak.upgrade() {
            journal.cancel_subscriber(*s2_id2.lock().unwrap());
        }
    });
    let s2_runs2 = Arc::clone(&s2_runs);
    let id = journal.register_subscriber(move || {
        s2_runs2.fetch_add(1, Ordering::SeqCst);
    });
    *s2_id.lock().unwrap() = id;

    journal.record_created(rp("a"));
    // Snapshot semantics: the cancelled subscriber may or may not have run
    // for the triggering event, but never for later ones.
    let after_first = s2_runs.load(Ordering::SeqCst);
    assert!(after_first <= 1);
    assert!(!journal.is_subscriber_valid(id));

    journal.record_created(rp("b"));
    journal.record_created(rp("c"));
    assert_eq!(s2_runs.load(Ordering::SeqCst), after_first);
}

#[test]
fn test_cancel_all_silences_everyone() {
    let journal = journal();
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let count2 = Arc::clone(&count);
        journal.register_subscriber(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
    }
    journal.record_created(rp("a"));
    assert_eq!(count.load(Ordering::SeqCst), 3);

    journal.cancel_all_subscribers();
    journal.record_created(rp("b"));
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_ids_stay_unique_across_cancellation() {
    let journal = journal();
    let a = journal.register_subscriber(|| {});
    journal.cancel_subscriber(a);
    let b = journal.register_subscriber(|| {});
    assert_ne!(a, b);
    assert!(!journal.is_subscriber_valid(a));
    assert!(journal.is_subscriber_valid(b));
}

#[test]
fn test_flush_notifies_subscribers() {
    let journal = journal();
    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    journal.register_subscriber(move || {
        count2.fetch_add(1, Ordering::SeqCst);
    });
    journal.record_created(rp("a"));
    journal.flush();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}
