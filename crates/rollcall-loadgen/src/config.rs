use core::time::Duration;

use anyhow::bail;
use chrono::{Days, NaiveDate};
use clap::{Parser, ValueEnum};
use rollcall::{ALPHABET, CODE_LEN, RetryScheduler, ScheduleMatch};

/// Number of distinct security codes available per issue date.
const CODE_SPACE: usize = ALPHABET.len().pow(CODE_LEN as u32);

fn default_kiosks() -> usize {
    num_cpus::get() * 8
}

/// Runtime configuration for the `rollcall-loadgen` binary.
///
/// Every kiosk performs `visits_per_kiosk` check-ins. A check-in picks a random
/// group, schedule and day, resolves the occurrence for it and issues a
/// security code for that day. Fewer groups and days mean more kiosks racing
/// on the same keys.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rollcall-loadgen",
    version,
    about = "Simulates concurrent kiosk check-ins and audits exactly-once results"
)]
pub struct CliArgs {
    /// Number of concurrent kiosk tasks.
    ///
    /// Environment variable: `KIOSKS`
    #[arg(long, env = "KIOSKS", default_value_t = default_kiosks())]
    pub kiosks: usize,

    /// Check-ins performed by each kiosk.
    ///
    /// Environment variable: `VISITS_PER_KIOSK`
    #[arg(long, env = "VISITS_PER_KIOSK", default_value_t = 64)]
    pub visits_per_kiosk: usize,

    /// Number of distinct groups visits are spread over.
    ///
    /// Environment variable: `GROUPS`
    #[arg(long, env = "GROUPS", default_value_t = 16)]
    pub groups: u32,

    /// Number of schedules per group. Zero means every visit is unscheduled;
    /// otherwise a visit picks no schedule or one of `1..=SCHEDULES`.
    ///
    /// Environment variable: `SCHEDULES`
    #[arg(long, env = "SCHEDULES", default_value_t = 0)]
    pub schedules: u32,

    /// Number of consecutive days visits are spread over.
    ///
    /// Environment variable: `DAYS`
    #[arg(long, env = "DAYS", default_value_t = 7)]
    pub days: u32,

    /// First day of the simulated window (`YYYY-MM-DD`).
    ///
    /// Environment variable: `START_DATE`
    #[arg(long, env = "START_DATE", default_value = "2025-01-05")]
    pub start_date: NaiveDate,

    /// Base backoff delay in milliseconds for both retry schedules.
    ///
    /// Environment variable: `BASE_DELAY_MS`
    #[arg(long, env = "BASE_DELAY_MS", default_value_t = 10)]
    pub base_delay_ms: u64,

    /// Attempt budget for occurrence creation.
    ///
    /// Environment variable: `OCCURRENCE_ATTEMPTS`
    #[arg(long, env = "OCCURRENCE_ATTEMPTS", default_value_t = RetryScheduler::OCCURRENCE_ATTEMPTS)]
    pub occurrence_attempts: u32,

    /// Attempt budget for security code issuance.
    ///
    /// Environment variable: `CODE_ATTEMPTS`
    #[arg(long, env = "CODE_ATTEMPTS", default_value_t = RetryScheduler::SECURITY_CODE_ATTEMPTS)]
    pub code_attempts: u32,

    /// How an unscheduled visit recovers an occurrence after a conflict.
    ///
    /// Environment variable: `SCHEDULE_MATCH`
    #[arg(long, env = "SCHEDULE_MATCH", value_enum, default_value_t = MatchArg::Exact)]
    pub schedule_match: MatchArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchArg {
    Exact,
    AnyWhenAbsent,
}

impl From<MatchArg> for ScheduleMatch {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Exact => Self::Exact,
            MatchArg::AnyWhenAbsent => Self::AnyWhenAbsent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub kiosks: usize,
    pub visits_per_kiosk: usize,
    pub groups: u32,
    pub schedules: u32,
    pub days: u32,
    pub start_date: NaiveDate,
    pub occurrence_retry: RetryScheduler,
    pub code_retry: RetryScheduler,
    pub schedule_match: ScheduleMatch,
}

impl LoadConfig {
    /// Total check-ins across all kiosks.
    pub const fn total_visits(&self) -> usize {
        self.kiosks * self.visits_per_kiosk
    }
}

impl TryFrom<CliArgs> for LoadConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.kiosks == 0 {
            bail!("KIOSKS must be greater than 0");
        }
        if args.groups == 0 {
            bail!("GROUPS must be greater than 0");
        }
        if args.days == 0 {
            bail!("DAYS must be greater than 0");
        }
        if args.occurrence_attempts == 0 || args.code_attempts == 0 {
            bail!("OCCURRENCE_ATTEMPTS and CODE_ATTEMPTS must be greater than 0");
        }

        if args
            .start_date
            .checked_add_days(Days::new(u64::from(args.days)))
            .is_none()
        {
            bail!(
                "START_DATE ({}) plus DAYS ({}) is out of range",
                args.start_date,
                args.days
            );
        }

        let total_visits = args
            .kiosks
            .checked_mul(args.visits_per_kiosk)
            .ok_or_else(|| anyhow::anyhow!("Overflow in total visit computation"))?;

        // Issuance slows sharply as a day's code space fills up; a single day
        // taking every visit must stay well below it.
        if total_visits > CODE_SPACE / 2 {
            bail!(
                "KIOSKS * VISITS_PER_KIOSK ({}) exceeds half the per-day code space ({})",
                total_visits,
                CODE_SPACE
            );
        }

        let base_delay = Duration::from_millis(args.base_delay_ms);
        Ok(Self {
            kiosks: args.kiosks,
            visits_per_kiosk: args.visits_per_kiosk,
            groups: args.groups,
            schedules: args.schedules,
            days: args.days,
            start_date: args.start_date,
            occurrence_retry: RetryScheduler::new(base_delay, args.occurrence_attempts),
            code_retry: RetryScheduler::new(base_delay, args.code_attempts),
            schedule_match: args.schedule_match.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<LoadConfig> {
        let args = CliArgs::try_parse_from(
            ["rollcall-loadgen", "--kiosks", "4"]
                .iter()
                .chain(extra.iter()),
        )?;
        LoadConfig::try_from(args)
    }

    #[test]
    fn defaults_match_library_presets() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.kiosks, 4);
        assert_eq!(config.occurrence_retry, RetryScheduler::occurrence());
        assert_eq!(config.code_retry, RetryScheduler::security_code());
        assert_eq!(config.schedule_match, ScheduleMatch::Exact);
        assert_eq!(config.total_visits(), 4 * 64);
    }

    #[test]
    fn schedule_match_is_parsed() {
        let config = parse(&["--schedule-match", "any-when-absent"]).unwrap();
        assert_eq!(config.schedule_match, ScheduleMatch::AnyWhenAbsent);
    }

    #[test]
    fn retry_settings_are_applied() {
        let config = parse(&["--base-delay-ms", "1", "--code-attempts", "3"]).unwrap();
        assert_eq!(
            config.code_retry,
            RetryScheduler::new(Duration::from_millis(1), 3)
        );
        assert_eq!(config.occurrence_retry.base_delay(), Duration::from_millis(1));
    }

    #[test]
    fn rejects_empty_dimensions() {
        let err = parse(&["--groups", "0"]).unwrap_err();
        assert!(err.to_string().contains("GROUPS"), "{err}");
        let err = parse(&["--days", "0"]).unwrap_err();
        assert!(err.to_string().contains("DAYS"), "{err}");
        let err = parse(&["--occurrence-attempts", "0"]).unwrap_err();
        assert!(err.to_string().contains("OCCURRENCE_ATTEMPTS"), "{err}");
    }

    #[test]
    fn rejects_more_visits_than_the_code_space_supports() {
        let err = parse(&["--visits-per-kiosk", "1000000"]).unwrap_err();
        assert!(err.to_string().contains("code space"), "{err}");
    }
}
