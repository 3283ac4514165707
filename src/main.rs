// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr, filtered by RUST_LOG / --verbose)
// 3. Open the observation store and build the monitor on top of it
// 4. Dispatch to the subcommand and print the result
// 5. Exit with proper code (0 = success, 1 = broken URLs, 2 = error)
// =============================================================================

mod checker; // src/checker/ - URL validation and checking
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - fixed limits and settings
mod error; // src/error.rs - typed errors
mod model; // src/model.rs - shared data types
mod monitor; // src/monitor.rs - the API the CLI talks to
mod store; // src/store/ - check history on disk
mod sweeper; // src/sweeper.rs - retention cleanup

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use log::{error, info, LevelFilter};

use cli::{Cli, Commands};
use config::Settings;
use error::MonitorError;
use model::{BatchSummary, CheckOutcome, Observation, RequestMetadata, Statistics};
use monitor::LinkMonitor;
use store::JsonStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Bad input is a usage problem, not something to log
            if is_validation_error(&e) {
                eprintln!("Error: {:#}", e);
            } else {
                error!("{:#}", e);
            }
            2
        }
    };

    std::process::exit(exit_code);
}

// Reads RUST_LOG first; --verbose then raises our own crate to debug
fn init_logger(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("link_watch", LevelFilter::Info)
        .parse_default_env();
    if verbose {
        builder.filter_module("link_watch", LevelFilter::Debug);
    }
    builder.init();
}

// Returns:
//   Ok(0) = nothing broken
//   Ok(1) = at least one checked URL is broken
//   Err   = validation, storage or client error
async fn run(cli: Cli) -> Result<i32> {
    let store = JsonStore::open(&cli.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", cli.data_dir.display()))?;
    let store = Arc::new(store);
    let mut monitor = LinkMonitor::new(store.clone())?;

    let metadata = RequestMetadata {
        user_agent: Some(config::user_agent()),
        ip: None,
        origin: cli.origin.clone(),
    };

    match cli.command {
        Commands::Check { url, json } => {
            let outcome = monitor.check_single(&url, Some(&metadata)).await?;
            let outcomes = [outcome];
            if json {
                print_json(&outcomes[0])?;
            } else {
                print_outcomes(&outcomes);
            }
            Ok(exit_code_for(&outcomes))
        }
        Commands::Batch { urls, json } => {
            println!("🌐 Checking {} URL(s)...\n", urls.len());
            let batch = monitor.check_batch(&urls, Some(&metadata)).await?;
            if json {
                print_json(&batch)?;
            } else {
                print_outcomes(&batch.results);
                print_summary(&batch.summary);
            }
            Ok(exit_code_for(&batch.results))
        }
        Commands::Stats { json } => {
            let stats = monitor.statistics().await?;
            if json {
                print_json(&stats)?;
            } else {
                print_statistics(&stats);
            }
            Ok(0)
        }
        Commands::Recent { limit, json } => {
            let observations = monitor.recent(limit).await?;
            if json {
                print_json(&observations)?;
            } else {
                print_observations(&observations);
            }
            Ok(0)
        }
        Commands::Range { start, end, json } => {
            let observations = monitor.by_date_range(start, end).await?;
            if json {
                print_json(&observations)?;
            } else {
                print_observations(&observations);
            }
            Ok(0)
        }
        Commands::Sweep {
            interval_hours,
            once,
        } => {
            let settings = Settings::new(interval_hours);
            if once {
                let report = sweeper::run_once(store.as_ref(), settings.retention).await?;
                println!(
                    "🧹 Removed {} check(s) and {} batch(es); kept {} and {}",
                    report.observations_removed,
                    report.batches_removed,
                    report.observations_kept,
                    report.batches_kept
                );
                return Ok(0);
            }

            monitor.start_retention_sweeper(&settings);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
            monitor.stop_retention_sweeper().await;
            Ok(0)
        }
    }
}

fn is_validation_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<MonitorError>()
        .is_some_and(MonitorError::is_validation)
}

fn exit_code_for(outcomes: &[CheckOutcome]) -> i32 {
    if outcomes.iter().any(|o| o.is_broken) {
        1
    } else {
        0
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Prints check outcomes as a human-readable table
fn print_outcomes(outcomes: &[CheckOutcome]) {
    println!("{:<60} {:<12} {:<8} {:<30}", "URL", "STATUS", "TIME", "MESSAGE");
    println!("{}", "=".repeat(112));

    for outcome in outcomes {
        println!(
            "{:<60} {:<12} {:<8} {:<30}",
            truncate(&outcome.url, 57),
            format_status(outcome),
            format_time(outcome.response_time_ms),
            outcome.error.as_deref().unwrap_or("")
        );
    }
    println!();
}

fn print_observations(observations: &[Observation]) {
    if observations.is_empty() {
        println!("No checks recorded");
        return;
    }

    println!("{:<26} {:<50} {:<12} {:<8}", "WHEN", "URL", "STATUS", "TIME");
    println!("{}", "=".repeat(99));
    for obs in observations {
        println!(
            "{:<26} {:<50} {:<12} {:<8}",
            obs.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            truncate(&obs.outcome.url, 47),
            format_status(&obs.outcome),
            format_time(obs.outcome.response_time_ms)
        );
    }
    println!("\n📋 {} check(s)", observations.len());
}

fn print_summary(summary: &BatchSummary) {
    println!("📊 Summary:");
    println!("   ✅ Working: {}", summary.working);
    println!("   ❌ Broken: {}", summary.broken);
    println!("   📋 Total: {}", summary.total);
}

fn print_statistics(stats: &Statistics) {
    let last_check = stats
        .last_check
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!("📊 Statistics:");
    println!("   Total checks:        {}", stats.total_checks);
    println!("   URLs checked:        {}", stats.total_urls);
    println!("   ✅ Working:          {}", stats.working_urls);
    println!("   ❌ Broken:           {}", stats.broken_urls);
    println!("   Avg response time:   {}ms", stats.average_response_time);
    println!("   Last check:          {}", last_check);
    println!("   Checks today:        {}", stats.checks_today);
    println!("   Checks this week:    {}", stats.checks_this_week);
    println!("   Checks this month:   {}", stats.checks_this_month);
}

fn format_status(outcome: &CheckOutcome) -> String {
    match (outcome.is_broken, outcome.status_code) {
        (false, Some(code)) => format!("✅ {}", code),
        (false, None) => "✅ OK".to_string(),
        (true, Some(code)) => format!("❌ {}", code),
        (true, None) => "❌ BROKEN".to_string(),
    }
}

fn format_time(response_time_ms: Option<u64>) -> String {
    response_time_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string())
}

// Cuts on a char boundary so multi-byte URLs don't panic
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
