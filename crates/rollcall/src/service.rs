use core::marker::PhantomData;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "async-smol")]
use crate::futures::SmolSleep;
#[cfg(feature = "async-tokio")]
use crate::futures::TokioSleep;
use crate::{
    code::SecureCodeGenerator,
    creator::IdempotentCreator,
    error::{Error, Result},
    futures::SleepProvider,
    model::{
        GroupId, IssuedCode, Occurrence, OccurrenceKey, OccurrenceLookup, ScheduleId,
        ScheduleMatch,
    },
    rand::{RandSource, ThreadRandom},
    retry::RetryScheduler,
    store::{LookupStore, Store},
};

/// The error returned by [`CheckIn::get_or_create_occurrence`].
pub type OccurrenceError<E> = Error<OccurrenceKey, E>;

/// The error returned by [`CheckIn::issue_security_code`].
pub type IssueError<E> = Error<NaiveDate, E>;

/// A [`CheckIn`] that backs off with Tokio's timer.
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub type TokioCheckIn<S, R = ThreadRandom> = CheckIn<S, TokioSleep, R>;

/// A [`CheckIn`] that backs off with Smol's timer.
#[cfg_attr(docsrs, doc(cfg(feature = "async-smol")))]
#[cfg(feature = "async-smol")]
pub type SmolCheckIn<S, R = ThreadRandom> = CheckIn<S, SmolSleep, R>;

/// The check-in core: idempotent occurrence creation and security code
/// issuance over one shared store.
///
/// A `CheckIn` holds no per-request state, so one instance (typically behind
/// an `Arc`) serves every kiosk. Concurrent callers never coordinate in
/// process; the store's uniqueness constraints do that.
///
/// - `S` is the store, which must enforce uniqueness on
///   `(group, date, schedule)` and on `(issue date, code)`.
/// - `SP` chooses the runtime used for backoff sleeps.
/// - `R` is the random source behind code generation.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use rollcall::{GroupId, MemoryStore, TokioCheckIn};
///
/// # tokio_test_block_on(async {
/// let check_in = TokioCheckIn::new(MemoryStore::new());
/// let sunday = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
///
/// let first = check_in
///     .get_or_create_occurrence(GroupId(42), None, sunday)
///     .await?;
/// let again = check_in
///     .get_or_create_occurrence(GroupId(42), None, sunday)
///     .await?;
/// assert_eq!(first, again);
/// assert_eq!(check_in.store().occurrences().len(), 1);
///
/// let issued = check_in.issue_security_code(sunday).await?;
/// assert_eq!(issued.issue_date(), sunday);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # }).unwrap();
/// # fn tokio_test_block_on<F: core::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread()
/// #         .enable_time()
/// #         .build()
/// #         .unwrap()
/// #         .block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct CheckIn<S, SP, R = ThreadRandom> {
    store: S,
    occurrence_retry: RetryScheduler,
    code_retry: RetryScheduler,
    schedule_match: ScheduleMatch,
    codes: SecureCodeGenerator<R>,
    shutdown: CancellationToken,
    _sleep: PhantomData<fn() -> SP>,
}

impl<S, SP> CheckIn<S, SP, ThreadRandom> {
    /// Creates a service over `store` with the default schedules, exact
    /// schedule matching and the thread-local RNG.
    pub fn new(store: S) -> Self {
        Self {
            store,
            occurrence_retry: RetryScheduler::occurrence(),
            code_retry: RetryScheduler::security_code(),
            schedule_match: ScheduleMatch::default(),
            codes: SecureCodeGenerator::new(),
            shutdown: CancellationToken::new(),
            _sleep: PhantomData,
        }
    }
}

impl<S, SP, R> CheckIn<S, SP, R> {
    #[must_use]
    pub fn with_occurrence_retry(mut self, schedule: RetryScheduler) -> Self {
        self.occurrence_retry = schedule;
        self
    }

    #[must_use]
    pub fn with_code_retry(mut self, schedule: RetryScheduler) -> Self {
        self.code_retry = schedule;
        self
    }

    /// Sets how conflict recovery matches the schedule of an occurrence.
    #[must_use]
    pub fn with_schedule_match(mut self, schedule_match: ScheduleMatch) -> Self {
        self.schedule_match = schedule_match;
        self
    }

    /// Uses `shutdown` as the token for calls made without their own.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Swaps the random source used for security codes.
    pub fn with_rand<R2>(self, rng: R2) -> CheckIn<S, SP, R2>
    where
        R2: RandSource<u8>,
    {
        CheckIn {
            store: self.store,
            occurrence_retry: self.occurrence_retry,
            code_retry: self.code_retry,
            schedule_match: self.schedule_match,
            codes: SecureCodeGenerator::with_rand(rng),
            shutdown: self.shutdown,
            _sleep: PhantomData,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn occurrence_retry(&self) -> RetryScheduler {
        self.occurrence_retry
    }

    pub const fn code_retry(&self) -> RetryScheduler {
        self.code_retry
    }

    pub const fn schedule_match(&self) -> ScheduleMatch {
        self.schedule_match
    }

    /// The service-wide token used by the calls without an `_until` suffix.
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancels every in-flight and future call that uses the service-wide
    /// token. Calls already past their last insert still complete.
    pub fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!("check-in shutdown requested");
        self.shutdown.cancel();
    }
}

impl<S, SP, R> CheckIn<S, SP, R>
where
    SP: SleepProvider,
    R: RandSource<u8>,
{
    /// Returns the occurrence for `(group_id, schedule_id, occurrence_date)`,
    /// creating it if this is the first check-in for that key.
    ///
    /// Any number of concurrent calls with the same arguments persist exactly
    /// one row and all return it.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_create_occurrence_until`].
    pub async fn get_or_create_occurrence(
        &self,
        group_id: GroupId,
        schedule_id: Option<ScheduleId>,
        occurrence_date: NaiveDate,
    ) -> Result<Occurrence, OccurrenceKey, <S as Store<Occurrence>>::Error>
    where
        S: LookupStore<Occurrence>,
    {
        self.get_or_create_occurrence_until(group_id, schedule_id, occurrence_date, &self.shutdown)
            .await
    }

    /// [`Self::get_or_create_occurrence`] with a per-call cancellation token.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if the store fails with anything but a uniqueness
    ///   violation.
    /// - [`Error::RetriesExhausted`] if the occurrence schedule runs out
    ///   before a row is created or adopted.
    /// - [`Error::Cancelled`] if `cancel` fires first.
    pub async fn get_or_create_occurrence_until(
        &self,
        group_id: GroupId,
        schedule_id: Option<ScheduleId>,
        occurrence_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Occurrence, OccurrenceKey, <S as Store<Occurrence>>::Error>
    where
        S: LookupStore<Occurrence>,
    {
        let key = OccurrenceKey::new(group_id, schedule_id, occurrence_date);
        let lookup = OccurrenceLookup::new(key, self.schedule_match);
        IdempotentCreator::new(&self.store, self.occurrence_retry)
            .get_or_create::<Occurrence, SP, _>(&key, &lookup, Occurrence::candidate, cancel)
            .await
    }

    /// Issues a security code that no other row holds for `issue_date`.
    ///
    /// # Errors
    ///
    /// See [`Self::issue_security_code_until`].
    pub async fn issue_security_code(
        &self,
        issue_date: NaiveDate,
    ) -> Result<IssuedCode, NaiveDate, <S as Store<IssuedCode>>::Error>
    where
        S: Store<IssuedCode>,
    {
        self.issue_security_code_until(issue_date, &self.shutdown)
            .await
    }

    /// [`Self::issue_security_code`] with a per-call cancellation token.
    ///
    /// A fresh code is drawn for every attempt; a collided code is never
    /// retried.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if the store fails with anything but a uniqueness
    ///   violation.
    /// - [`Error::RetriesExhausted`] if every attempt in the code schedule
    ///   collides. The error carries `issue_date`.
    /// - [`Error::Cancelled`] if `cancel` fires first.
    pub async fn issue_security_code_until(
        &self,
        issue_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<IssuedCode, NaiveDate, <S as Store<IssuedCode>>::Error>
    where
        S: Store<IssuedCode>,
    {
        IdempotentCreator::new(&self.store, self.code_retry)
            .create_unique::<IssuedCode, SP, _, _>(
                &issue_date,
                || IssuedCode::new(issue_date, self.codes.generate()),
                cancel,
            )
            .await
    }
}

#[cfg(all(test, feature = "async-tokio"))]
mod tests {
    use core::{
        fmt,
        future::{Future, ready},
        sync::atomic::{AtomicU32, AtomicUsize, Ordering},
    };
    use std::{collections::HashSet, sync::Arc};

    use futures::future::try_join_all;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        MemoryStore, MemoryStoreError, MessageClassifier, Record, Recoverable,
        SqlStateClassifier,
    };

    /// Replays a fixed byte sequence, wrapping at the end.
    struct ScriptedRand {
        bytes: Vec<u8>,
        next: AtomicUsize,
    }

    impl ScriptedRand {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                next: AtomicUsize::new(0),
            }
        }
    }

    impl RandSource<u8> for ScriptedRand {
        fn rand(&self) -> u8 {
            let i = self.next.fetch_add(1, Ordering::Relaxed);
            self.bytes[i % self.bytes.len()]
        }
    }

    /// Rejects the first `collisions` code inserts as duplicates without
    /// persisting them, then defers to a [`MemoryStore`].
    struct CollidingStore {
        inner: MemoryStore,
        collisions: u32,
        attempts: AtomicU32,
        rejected: Mutex<Vec<IssuedCode>>,
    }

    impl CollidingStore {
        fn new(collisions: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                collisions,
                attempts: AtomicU32::new(0),
                rejected: Mutex::new(Vec::new()),
            }
        }
    }

    impl Store<IssuedCode> for CollidingStore {
        type Error = MemoryStoreError;
        type Classifier = SqlStateClassifier;

        fn insert(
            &self,
            row: &IssuedCode,
        ) -> impl Future<Output = core::result::Result<(), MemoryStoreError>> + Send {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < self.collisions {
                    self.rejected.lock().push(*row);
                    return Err(MemoryStoreError::UniqueViolation {
                        constraint: "issued_code_date_code_key",
                    });
                }
                self.inner.insert(row).await
            }
        }
    }

    /// Enforces uniqueness on `(group, date)` only, ignoring the schedule.
    /// Stands in for a schema whose constraint predates schedules.
    #[derive(Default)]
    struct GroupDateStore {
        rows: Mutex<Vec<Occurrence>>,
        finds: AtomicU32,
    }

    impl Store<Occurrence> for GroupDateStore {
        type Error = &'static str;
        type Classifier = MessageClassifier;

        fn insert(
            &self,
            row: &Occurrence,
        ) -> impl Future<Output = core::result::Result<(), &'static str>> + Send {
            let mut rows = self.rows.lock();
            let taken = rows.iter().any(|r| {
                r.group_id() == row.group_id() && r.occurrence_date() == row.occurrence_date()
            });
            let res = if taken {
                Err("UNIQUE constraint failed: occurrence.group_id, occurrence.date")
            } else {
                rows.push(*row);
                Ok(())
            };
            ready(res)
        }
    }

    impl LookupStore<Occurrence> for GroupDateStore {
        fn find(
            &self,
            lookup: &OccurrenceLookup,
        ) -> impl Future<Output = core::result::Result<Option<Occurrence>, &'static str>> + Send
        {
            self.finds.fetch_add(1, Ordering::SeqCst);
            let found = self.rows.lock().iter().find(|r| r.matches(lookup)).copied();
            ready(Ok(found))
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn fifty_kiosks_share_one_occurrence() {
        let check_in = Arc::new(TokioCheckIn::new(MemoryStore::new()));
        let sunday = day(2025, 1, 5);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let check_in = Arc::clone(&check_in);
                tokio::spawn(async move {
                    check_in
                        .get_or_create_occurrence(GroupId(42), None, sunday)
                        .await
                })
            })
            .collect();

        let rows: Vec<_> = try_join_all(tasks)
            .await
            .unwrap()
            .into_iter()
            .map(core::result::Result::unwrap)
            .collect();

        let persisted = check_in.store().occurrences();
        assert_eq!(persisted.len(), 1);
        assert!(rows.iter().all(|row| *row == persisted[0]));
        assert_eq!(persisted[0].group_id(), GroupId(42));
        assert_eq!(persisted[0].schedule_id(), None);
        assert_eq!(persisted[0].week_anchor_date(), sunday);
    }

    #[tokio::test]
    async fn occurrence_carries_week_anchor() {
        let check_in = TokioCheckIn::new(MemoryStore::new());
        let row = check_in
            .get_or_create_occurrence(GroupId(1), Some(ScheduleId(3)), day(2025, 3, 1))
            .await
            .unwrap();
        assert_eq!(row.week_anchor_date(), day(2025, 2, 23));
        assert_eq!(row.schedule_id(), Some(ScheduleId(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn collided_codes_are_discarded() {
        // Three draws of four bytes each: "2222", "3333", "4444".
        let store = CollidingStore::new(2);
        let check_in = TokioCheckIn::new(store)
            .with_rand(ScriptedRand::new(&[0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]));
        let date = day(2025, 6, 1);

        let issued = check_in.issue_security_code(date).await.unwrap();

        assert_eq!(issued.code().as_str(), "4444");
        assert_eq!(issued.issue_date(), date);

        let rejected: Vec<_> = check_in
            .store()
            .rejected
            .lock()
            .iter()
            .map(|r| r.code().to_string())
            .collect();
        assert_eq!(rejected, ["2222", "3333"]);
        assert_eq!(check_in.store().inner.codes_for(date), vec![issued]);
        assert_eq!(check_in.store().attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn every_collision_exhausts_code_issuance() {
        let check_in = TokioCheckIn::new(CollidingStore::new(u32::MAX));
        let date = day(2025, 6, 1);

        let err = check_in.issue_security_code(date).await.unwrap_err();

        assert_eq!(
            err,
            Error::RetriesExhausted {
                key: date,
                attempts: 10
            }
        );
        let message = err.to_string();
        assert!(message.contains("2025-06-01"), "{message}");
        assert!(message.contains("10"), "{message}");
        assert_eq!(check_in.store().attempts.load(Ordering::SeqCst), 10);
        assert!(check_in.store().inner.issued_codes().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_issues_never_share_a_code() {
        let check_in = Arc::new(TokioCheckIn::new(MemoryStore::new()));
        let date = day(2025, 6, 1);

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let check_in = Arc::clone(&check_in);
                tokio::spawn(async move { check_in.issue_security_code(date).await })
            })
            .collect();

        let codes: HashSet<_> = try_join_all(tasks)
            .await
            .unwrap()
            .into_iter()
            .map(|issued| issued.unwrap().key())
            .collect();

        assert_eq!(codes.len(), 200);
        assert_eq!(check_in.store().codes_for(date).len(), 200);
    }

    #[tokio::test]
    async fn same_code_may_repeat_across_dates() {
        let check_in =
            TokioCheckIn::new(MemoryStore::new()).with_rand(ScriptedRand::new(&[5, 6, 7, 8]));

        let a = check_in.issue_security_code(day(2025, 6, 1)).await.unwrap();
        let b = check_in.issue_security_code(day(2025, 6, 2)).await.unwrap();

        assert_eq!(a.code(), b.code());
        assert_eq!(check_in.store().issued_codes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exact_matching_does_not_adopt_a_scheduled_row() {
        let check_in = TokioCheckIn::new(GroupDateStore::default());
        let date = day(2025, 1, 5);
        let scheduled = check_in
            .get_or_create_occurrence(GroupId(7), Some(ScheduleId(2)), date)
            .await
            .unwrap();

        let err = check_in
            .get_or_create_occurrence(GroupId(7), None, date)
            .await
            .unwrap_err();

        assert!(err.is_retries_exhausted());
        assert_eq!(err.key(), Some(&OccurrenceKey::new(GroupId(7), None, date)));
        assert_eq!(check_in.store().finds.load(Ordering::SeqCst), 5);
        assert_eq!(*check_in.store().rows.lock(), vec![scheduled]);
    }

    #[tokio::test]
    async fn absent_schedule_can_adopt_any_row_for_the_day() {
        let check_in = TokioCheckIn::new(GroupDateStore::default())
            .with_schedule_match(ScheduleMatch::AnyWhenAbsent);
        let date = day(2025, 1, 5);
        let scheduled = check_in
            .get_or_create_occurrence(GroupId(7), Some(ScheduleId(2)), date)
            .await
            .unwrap();

        let adopted = check_in
            .get_or_create_occurrence(GroupId(7), None, date)
            .await
            .unwrap();

        assert_eq!(adopted, scheduled);
        assert_eq!(check_in.store().finds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_plain_calls_only() {
        let check_in = TokioCheckIn::new(MemoryStore::new());
        let date = day(2025, 1, 5);
        check_in.shutdown();
        assert!(check_in.shutdown_token().is_cancelled());

        let err = check_in
            .get_or_create_occurrence(GroupId(1), None, date)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        let err = check_in.issue_security_code(date).await.unwrap_err();
        assert_eq!(err, Error::Cancelled { key: date });
        assert_eq!(check_in.store().stats().inserts, 0);

        let own = CancellationToken::new();
        let row = check_in
            .get_or_create_occurrence_until(GroupId(1), None, date, &own)
            .await
            .unwrap();
        assert_eq!(row.group_id(), GroupId(1));
    }

    #[tokio::test]
    async fn shared_shutdown_token_is_honoured() {
        let token = CancellationToken::new();
        let check_in = TokioCheckIn::new(MemoryStore::new()).with_shutdown(token.child_token());
        token.cancel();

        let err = check_in
            .issue_security_code(day(2025, 6, 1))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn builders_replace_defaults() {
        let schedule = RetryScheduler::new(core::time::Duration::from_millis(1), 3);
        let check_in = TokioCheckIn::new(MemoryStore::new())
            .with_occurrence_retry(schedule)
            .with_code_retry(schedule)
            .with_schedule_match(ScheduleMatch::AnyWhenAbsent);

        assert_eq!(check_in.occurrence_retry(), schedule);
        assert_eq!(check_in.code_retry(), schedule);
        assert_eq!(check_in.schedule_match(), ScheduleMatch::AnyWhenAbsent);

        let defaults = TokioCheckIn::new(MemoryStore::new());
        assert_eq!(defaults.occurrence_retry(), RetryScheduler::occurrence());
        assert_eq!(defaults.code_retry(), RetryScheduler::security_code());
        assert_eq!(defaults.schedule_match(), ScheduleMatch::Exact);
    }

    #[cfg(feature = "serde")]
    #[tokio::test]
    async fn issued_code_serializes_as_text() {
        let check_in =
            TokioCheckIn::new(MemoryStore::new()).with_rand(ScriptedRand::new(&[8, 9, 10, 11]));
        let issued = check_in.issue_security_code(day(2025, 6, 1)).await.unwrap();

        let json = serde_json::to_value(issued).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "issue_date": "2025-06-01", "code": "ABCD" })
        );
        let back: IssuedCode = serde_json::from_value(json).unwrap();
        assert_eq!(back, issued);
    }
}
