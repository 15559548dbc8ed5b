//! # FCJ Tail
//!
//! A standalone CLI demo built on the FCJ journal crates. It drives a
//! journal through scripted working-copy sessions and tails the changes
//! live from a subscriber, the same way a change-notification RPC surface
//! would: remember the last sequence you saw, and on every wakeup
//! summarize everything after it with `accumulate_range`.
//!
//! ## Tail loop
//!
//! ```text
//! subscriber wakeup -> accumulate_range(last_seen + 1)
//!                   -> print created/modified/removed + transitions
//!                   -> last_seen = range.to_sequence
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};

use clap::{Parser, Subcommand};
use colored::*;
use fcj_core::hash::Hash;
use fcj_core::path::RelPath;
use fcj_journal::{DebugDeltaRecord, Journal, JournalConfig, JournalTelemetry};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fcj-tail")]
#[command(about = "Tail a file change journal live (FCJ demo)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: an edit/checkout session tailed live by a subscriber
    Demo,
    /// Truncation scenario: a tiny memory budget and what readers see
    Truncation,
    /// Flush scenario: the explicit boundary flush leaves behind
    Flush,
    /// Raw journal dump after a short scripted session
    Raw,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Truncation => run_truncation(),
        Commands::Flush => run_flush(),
        Commands::Raw => run_raw(),
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

// ─── Tailer: a subscriber that prints what changed since last wakeup ──────

struct Tailer {
    journal: Weak<Journal>,
    last_seen: Mutex<u64>,
}

impl Tailer {
    /// Attach a printing tailer to the journal and return it.
    fn attach(journal: &Arc<Journal>) -> Arc<Tailer> {
        let tailer = Arc::new(Tailer {
            journal: Arc::downgrade(journal),
            last_seen: Mutex::new(0),
        });
        let hook = Arc::clone(&tailer);
        journal.register_subscriber(move || hook.wakeup());
        tailer
    }

    fn wakeup(&self) {
        let journal = match self.journal.upgrade() {
            Some(journal) => journal,
            None => return,
        };
        let mut last_seen = match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let range = match journal.accumulate_range(*last_seen + 1) {
            Some(range) => range,
            None => return,
        };
        *last_seen = range.to_sequence;

        let mut parts: Vec<String> = Vec::new();
        let created: Vec<_> = range.created_files().map(|p| p.to_string()).collect();
        if !created.is_empty() {
            parts.push(format!("+{}", created.join(" +")).bright_green().to_string());
        }
        let modified: Vec<_> = range.modified_files().map(|p| p.to_string()).collect();
        if !modified.is_empty() {
            parts.push(format!("~{}", modified.join(" ~")).bright_yellow().to_string());
        }
        let removed: Vec<_> = range.removed_files().map(|p| p.to_string()).collect();
        if !removed.is_empty() {
            parts.push(format!("-{}", removed.join(" -")).bright_red().to_string());
        }
        for transition in range.snapshot_transitions.iter().rev() {
            parts.push(
                format!(
                    "checkout {} → {}",
                    transition.from_hash.short(),
                    transition.to_hash.short()
                )
                .bright_magenta()
                .to_string(),
            );
        }
        if range.is_truncated {
            parts.push("(truncated)".dimmed().to_string());
        }
        println!(
            "  {} seq {:>3}  {}",
            "tail".bright_cyan(),
            range.to_sequence,
            parts.join("  ")
        );
    }
}

fn rp(s: &str) -> RelPath {
    s.parse().expect("demo paths are valid")
}

// ─── Scenarios ─────────────────────────────────────────────────────────────

fn run_demo() {
    header("FCJ Demo: live tail of an edit/checkout session");
    let journal = Arc::new(Journal::new(Arc::new(JournalTelemetry::new())));
    let _tailer = Tailer::attach(&journal);

    section("A feature branch takes shape");
    step("create src/feature.rs, edit it twice");
    journal.record_created(rp("src/feature.rs"));
    journal.record_changed(rp("src/feature.rs"));
    journal.record_changed(rp("src/feature.rs"));

    step("checkout rev-a");
    journal.record_hash_update(Hash::for_rev("rev-a"));

    step("rename src/feature.rs to src/lib.rs, drop a scratch file");
    journal.record_created(rp("scratch.txt"));
    journal.record_renamed(rp("src/feature.rs"), rp("src/lib.rs"));
    journal.record_removed(rp("scratch.txt"));

    step("checkout rev-b with one locally modified file");
    journal.record_unclean_paths(
        Hash::for_rev("rev-a"),
        Hash::for_rev("rev-b"),
        BTreeSet::from([rp("src/lib.rs")]),
    );

    section("Summary over the whole session");
    if let Some(range) = journal.accumulate_range(0) {
        step(&format!(
            "sequences {}..{}, {} snapshot transition(s)",
            range.from_sequence,
            range.to_sequence,
            range.snapshot_transitions.len()
        ));
        step(&format!(
            "created: {}",
            range
                .created_files()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        step(&format!(
            "unclean: {}",
            range
                .unclean_paths
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
}

fn run_truncation() {
    header("FCJ Demo: truncation under a tiny memory budget");
    let journal = Arc::new(Journal::with_config(
        Arc::new(JournalTelemetry::new()),
        JournalConfig { memory_limit: 2048 },
    ));
    let _tailer = Tailer::attach(&journal);

    section("Churning through more history than the budget retains");
    for i in 0..20 {
        journal.record_created(rp(&format!("build/artifact-{}.o", i)));
        journal.record_hash_update(Hash::for_rev(format!("rev-{}", i)));
    }

    section("What a reader that fell behind sees");
    match journal.accumulate_range(1) {
        Some(range) if range.is_truncated => {
            step(&format!(
                "asked from sequence 1, journal only remembers {}..{}",
                range.from_sequence, range.to_sequence
            ));
            step(&"is_truncated = true: resync from a fresh snapshot".bright_red().to_string());
        }
        Some(_) => step("nothing was truncated (budget was generous)"),
        None => step("journal is empty"),
    }
    let telemetry = journal.telemetry().snapshot();
    step(&format!(
        "telemetry: {} entries truncated, {} truncated reads",
        telemetry.entries_truncated, telemetry.truncated_reads
    ));
}

fn run_flush() {
    header("FCJ Demo: flush leaves an explicit boundary");
    let journal = Arc::new(Journal::new(Arc::new(JournalTelemetry::new())));
    let _tailer = Tailer::attach(&journal);

    section("Some history, then a flush");
    journal.record_created(rp("a.txt"));
    journal.record_hash_update(Hash::for_rev("rev-a"));
    journal.record_changed(rp("a.txt"));
    step("flush()");
    journal.flush();

    section("After the flush");
    if let Some(latest) = journal.get_latest() {
        step(&format!(
            "tip is a synthetic transition {} → {} at sequence {}",
            latest.from_hash.short(),
            latest.to_hash.short(),
            latest.sequence
        ));
    }
    if let Some(range) = journal.accumulate_range(0) {
        step(&format!(
            "accumulate_range(0).is_truncated = {}",
            range.is_truncated
        ));
    }
}

fn run_raw() {
    header("FCJ Demo: raw journal dump");
    let journal = Arc::new(Journal::new(Arc::new(JournalTelemetry::new())));

    journal.record_created(rp("src/main.rs"));
    journal.record_created(rp("src/util.rs"));
    journal.record_hash_update(Hash::for_rev("rev-a"));
    journal.record_replaced(rp("src/util.rs.tmp"), rp("src/util.rs"));
    journal.record_hash_update(Hash::for_rev("rev-b"));

    section("Newest first, mount generation 1");
    for entry in journal.debug_raw_journal_info(0, None, 1) {
        let what = match &entry.record {
            DebugDeltaRecord::FileChange {
                kind,
                path1,
                path2,
                changed_paths,
            } => {
                let target = match path2 {
                    Some(path2) => format!("{} → {}", path1, path2),
                    None => path1.to_string(),
                };
                format!("{:?} {} ({} path(s))", kind, target, changed_paths.len())
            }
            DebugDeltaRecord::HashUpdate { unclean_paths } => format!(
                "checkout ({} unclean)",
                unclean_paths.len()
            ),
        };
        let hashes = if entry.from_hash == entry.to_hash {
            format!("@{}", entry.to_hash.short())
        } else {
            format!("{} → {}", entry.from_hash.short(), entry.to_hash.short())
        };
        println!(
            "  seq {:>3}  gen {}  {}  {}",
            entry.sequence.to_string().bright_yellow(),
            entry.mount_generation,
            hashes.bright_magenta(),
            what
        );
    }

    let zero = Hash::ZERO;
    step(&format!("zero hash renders as {}", zero.short()));
}
