mod audit;
mod config;
mod kiosk;
mod telemetry;

use std::{sync::Arc, time::Instant};

use audit::{Summary, audit};
use clap::Parser;
use config::{CliArgs, LoadConfig};
use futures::future::try_join_all;
use kiosk::{LoadCheckIn, run_kiosk};
use rollcall::MemoryStore;
use telemetry::init_telemetry;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Arc::new(LoadConfig::try_from(args)?);

    init_telemetry()?;
    log_startup_info(&config);

    let check_in = Arc::new(
        LoadCheckIn::new(MemoryStore::new())
            .with_occurrence_retry(config.occurrence_retry)
            .with_code_retry(config.code_retry)
            .with_schedule_match(config.schedule_match),
    );

    let watcher = tokio::spawn(shutdown_signal(Arc::clone(&check_in)));

    let start = Instant::now();
    let kiosks: Vec<_> = (0..config.kiosks)
        .map(|kiosk| {
            tokio::spawn(run_kiosk(
                kiosk,
                Arc::clone(&check_in),
                Arc::clone(&config),
            ))
        })
        .collect();
    let reports = try_join_all(kiosks).await?;
    let elapsed = start.elapsed();
    watcher.abort();

    let summary = audit(check_in.store(), &reports, elapsed)?;
    log_summary(&summary);

    if summary.failures > 0 {
        anyhow::bail!("{} check-in calls failed", summary.failures);
    }
    Ok(())
}

fn log_startup_info(config: &LoadConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load run with full config: {:#?}", config);
    } else {
        tracing::info!(
            kiosks = config.kiosks,
            visits = config.total_visits(),
            groups = config.groups,
            days = config.days,
            "Starting load run"
        );
    }
}

fn log_summary(summary: &Summary) {
    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.visits as f64 / secs
    } else {
        0.0
    };
    tracing::info!(
        kiosks = summary.kiosks,
        visits = summary.visits,
        cancelled_kiosks = summary.cancelled_kiosks,
        occurrences = summary.occurrences,
        codes = summary.codes,
        inserts = summary.inserts,
        conflicts = summary.conflicts,
        lookups = summary.lookups,
        elapsed = ?summary.elapsed,
        visits_per_sec = rate,
        "Audit passed"
    );
}

/// Cancels outstanding check-ins on Ctrl+C. Kiosks stop at their next
/// attempt or backoff, and the run is audited as usual.
async fn shutdown_signal(check_in: Arc<LoadCheckIn>) {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {err}");
        return;
    }

    tracing::info!("Received Ctrl+C signal, cancelling in-flight check-ins");
    check_in.shutdown();
}
