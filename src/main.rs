//! FCJ Stress Test Runner
//!
//! This binary provides a command-line interface for running stress tests
//! and benchmarks against the FCJ journal crates.

use stress_test::{run_churn_suite, run_concurrent_suite, run_full_suite, run_quick_suite};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Parse command line args for suite selection
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "quick" => run_quick_suite(),
            "churn" => run_churn_suite(),
            "concurrent" => run_concurrent_suite(),
            "full" => run_full_suite(),
            "help" | "--help" | "-h" => print_usage(),
            _ => {
                println!("Unknown test suite: {}", args[1]);
                print_usage();
            }
        }
    } else {
        // Default: run quick tests
        run_quick_suite();
    }
}

fn print_usage() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              FCJ JOURNAL STRESS TEST SUITE                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Usage: cargo run [test_suite]");
    println!();
    println!("Available test suites:");
    println!("  quick       - Quick smoke tests (default)");
    println!("  churn       - Truncation under tight memory budgets");
    println!("  concurrent  - Multi-threaded producers with racing readers");
    println!("  full        - Full soak: every suite at scale");
    println!();
    println!("Set RUST_LOG=debug to watch truncation passes as they happen.");
}
