use core::time::Duration;

/// Deterministic exponential backoff with a bounded attempt count.
///
/// The delay after attempt `k` (zero-based) is `base_delay * 2^k`. With the
/// default 10ms base this yields 10, 20, 40, 80, 160ms for the first five
/// attempts. No jitter is applied, so racers that collide on one tick retry on
/// the same schedule; this is tuned for tens of concurrent callers, not
/// thousands.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use rollcall::RetryScheduler;
///
/// let schedule = RetryScheduler::occurrence();
/// assert_eq!(schedule.max_attempts(), 5);
/// assert_eq!(schedule.delay_for(2), Duration::from_millis(40));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryScheduler {
    base_delay: Duration,
    max_attempts: u32,
}

impl RetryScheduler {
    /// Base delay used by the preset schedules.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);

    /// Attempt budget for occurrence creation.
    pub const OCCURRENCE_ATTEMPTS: u32 = 5;

    /// Attempt budget for security code issuance.
    pub const SECURITY_CODE_ATTEMPTS: u32 = 10;

    /// Creates a schedule. A `max_attempts` of zero is raised to one: every
    /// call gets at least one insert.
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
        }
    }

    /// The schedule used for occurrence creation: 10ms base, 5 attempts.
    pub const fn occurrence() -> Self {
        Self::new(Self::DEFAULT_BASE_DELAY, Self::OCCURRENCE_ATTEMPTS)
    }

    /// The schedule used for security code issuance: 10ms base, 10 attempts.
    pub const fn security_code() -> Self {
        Self::new(Self::DEFAULT_BASE_DELAY, Self::SECURITY_CODE_ATTEMPTS)
    }

    /// Backoff to wait after the zero-based attempt `attempt` fails.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match 1_u32.checked_shl(attempt) {
            Some(factor) => self.base_delay.saturating_mul(factor),
            None => Duration::MAX,
        }
    }

    /// Total number of attempts allowed, including the first.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns `true` if another attempt may follow the zero-based `attempt`.
    pub const fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::occurrence()
    }
}
