//! Console logging for the load driver.
//!
//! Log levels follow `RUST_LOG` and default to `info`. Per-attempt events from
//! the library (conflicts, race-window misses, backoff) are emitted at `debug`
//! and `trace`:
//!
//! ```bash
//! RUST_LOG=rollcall=debug cargo run -p rollcall-loadgen -- --groups 1 --days 1
//! ```

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}
