use std::sync::Arc;

use chrono::{Days, NaiveDate};
use rand::{Rng, rng};
use rollcall::{GroupId, IssuedCode, MemoryStore, Occurrence, ScheduleId, TokioCheckIn};
use tracing::instrument;

use crate::config::LoadConfig;

/// The service every simulated kiosk shares.
pub type LoadCheckIn = TokioCheckIn<MemoryStore>;

/// One simulated check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub group_id: GroupId,
    pub schedule_id: Option<ScheduleId>,
    pub date: NaiveDate,
}

impl Visit {
    /// Picks a uniformly random group, schedule and day within `config`.
    pub fn random(config: &LoadConfig) -> Self {
        let mut rng = rng();
        let group_id = GroupId(i64::from(rng.random_range(0..config.groups)));
        let schedule_id = match rng.random_range(0..=config.schedules) {
            0 => None,
            n => Some(ScheduleId(i64::from(n))),
        };
        let offset = Days::new(u64::from(rng.random_range(0..config.days)));
        let date = config
            .start_date
            .checked_add_days(offset)
            .unwrap_or(config.start_date);
        Self {
            group_id,
            schedule_id,
            date,
        }
    }
}

/// What one kiosk observed.
#[derive(Debug, Default)]
pub struct KioskReport {
    /// Check-ins that resolved an occurrence and received a code.
    pub visits: u64,
    /// Calls that failed with anything but cancellation.
    pub failures: u64,
    pub cancelled: bool,
    pub occurrences: Vec<Occurrence>,
    pub codes: Vec<IssuedCode>,
}

/// Runs `config.visits_per_kiosk` check-ins back to back.
///
/// Failures are logged and counted; the kiosk moves on to its next visit. A
/// cancelled call stops the kiosk.
#[instrument(level = "debug", skip(check_in, config))]
pub async fn run_kiosk(
    kiosk: usize,
    check_in: Arc<LoadCheckIn>,
    config: Arc<LoadConfig>,
) -> KioskReport {
    let mut report = KioskReport::default();

    for _ in 0..config.visits_per_kiosk {
        let visit = Visit::random(&config);

        match check_in
            .get_or_create_occurrence(visit.group_id, visit.schedule_id, visit.date)
            .await
        {
            Ok(row) => report.occurrences.push(row),
            Err(err) if err.is_cancelled() => {
                report.cancelled = true;
                break;
            }
            Err(err) => {
                tracing::warn!(kiosk, error = %err, "occurrence failed");
                report.failures += 1;
                continue;
            }
        }

        match check_in.issue_security_code(visit.date).await {
            Ok(issued) => report.codes.push(issued),
            Err(err) if err.is_cancelled() => {
                report.cancelled = true;
                break;
            }
            Err(err) => {
                tracing::warn!(kiosk, error = %err, "code issuance failed");
                report.failures += 1;
                continue;
            }
        }

        report.visits += 1;
    }

    tracing::debug!(kiosk, visits = report.visits, "kiosk finished");
    report
}
