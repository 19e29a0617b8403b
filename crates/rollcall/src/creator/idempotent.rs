use core::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    futures::{SleepProvider, sleep_or_cancel},
    retry::RetryScheduler,
    store::{InsertOutcome, LookupStore, Record, Recoverable, Store},
};

/// Insert-first, resolve-on-conflict creation against a store with a
/// uniqueness constraint.
///
/// No lock is taken: the store's constraint is the only synchronisation
/// point. Every attempt builds a fresh candidate, so nothing from a losing
/// attempt leaks into the next one.
///
/// The creator borrows the store and is cheap to construct per call.
#[derive(Debug)]
pub struct IdempotentCreator<'s, S> {
    store: &'s S,
    schedule: RetryScheduler,
}

impl<S> Clone for IdempotentCreator<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for IdempotentCreator<'_, S> {}

impl<'s, S> IdempotentCreator<'s, S> {
    pub const fn new(store: &'s S, schedule: RetryScheduler) -> Self {
        Self { store, schedule }
    }

    pub const fn schedule(&self) -> RetryScheduler {
        self.schedule
    }

    /// Returns the canonical row for `key`, creating it if no caller has yet.
    ///
    /// Each attempt inserts `build(key)`. On a uniqueness conflict the
    /// candidate is dropped and the row matching `lookup` is adopted. If the
    /// winner is not visible yet the loop backs off and tries again.
    ///
    /// Concurrent callers with the same key all return a row with that key,
    /// and exactly one row is persisted for it.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] on the first insert or lookup failure that is not a
    ///   uniqueness violation.
    /// - [`Error::RetriesExhausted`] once the schedule's attempt budget is
    ///   spent without resolving the key.
    /// - [`Error::Cancelled`] if `cancel` fires before an attempt or during
    ///   backoff.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(key = ?key))
    )]
    pub async fn get_or_create<R, SP, F>(
        &self,
        key: &R::Key,
        lookup: &R::Lookup,
        build: F,
        cancel: &CancellationToken,
    ) -> Result<R, R::Key, <S as Store<R>>::Error>
    where
        S: LookupStore<R>,
        R: Recoverable,
        SP: SleepProvider,
        F: Fn(&R::Key) -> R,
    {
        let max_attempts = self.schedule.max_attempts();
        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { key: key.clone() });
            }

            let candidate = build(key);
            let outcome = InsertOutcome::classify::<<S as Store<R>>::Classifier>(
                self.store.insert(&candidate).await,
            );
            match outcome {
                InsertOutcome::Inserted => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "created");
                    return Ok(candidate);
                }
                InsertOutcome::Failed(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt, error = %err, "insert failed");
                    return Err(Error::Store(err));
                }
                InsertOutcome::Conflict => {
                    // The losing candidate must be gone before the read.
                    drop(candidate);
                    if let Some(winner) = self.store.find(lookup).await.map_err(Error::Store)? {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempt, "adopted existing row");
                        return Ok(winner);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "conflict without a visible winner");
                }
            }

            if !self.back_off::<SP>(attempt, cancel).await {
                return Err(Error::Cancelled { key: key.clone() });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::error!(
            attempts = max_attempts,
            "retries exhausted; is the uniqueness constraint in place?"
        );
        Err(Error::RetriesExhausted {
            key: key.clone(),
            attempts: max_attempts,
        })
    }

    /// Inserts a freshly generated row, regenerating on every conflict.
    ///
    /// Unlike [`Self::get_or_create`] there is nothing to adopt: the caller
    /// needs *a* unique row, not a particular one. `next` is called once per
    /// attempt and a colliding candidate is never reused. `label` names the
    /// request in errors.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] on the first insert failure that is not a uniqueness
    ///   violation.
    /// - [`Error::RetriesExhausted`] once every attempt has collided.
    /// - [`Error::Cancelled`] if `cancel` fires before an attempt or during
    ///   backoff.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(label = ?label))
    )]
    pub async fn create_unique<R, SP, K, F>(
        &self,
        label: &K,
        mut next: F,
        cancel: &CancellationToken,
    ) -> Result<R, K, <S as Store<R>>::Error>
    where
        S: Store<R>,
        R: Record,
        SP: SleepProvider,
        K: Clone + fmt::Debug,
        F: FnMut() -> R,
    {
        let max_attempts = self.schedule.max_attempts();
        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { key: label.clone() });
            }

            let candidate = next();
            let outcome = InsertOutcome::classify::<<S as Store<R>>::Classifier>(
                self.store.insert(&candidate).await,
            );
            match outcome {
                InsertOutcome::Inserted => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "created");
                    return Ok(candidate);
                }
                InsertOutcome::Failed(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt, error = %err, "insert failed");
                    return Err(Error::Store(err));
                }
                InsertOutcome::Conflict => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "candidate collided; regenerating");
                }
            }

            if !self.back_off::<SP>(attempt, cancel).await {
                return Err(Error::Cancelled { key: label.clone() });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::error!(attempts = max_attempts, "retries exhausted");
        Err(Error::RetriesExhausted {
            key: label.clone(),
            attempts: max_attempts,
        })
    }

    /// Sleeps before the attempt following `attempt`. Nothing is slept after
    /// the final attempt.
    ///
    /// Returns `false` if `cancel` fired first.
    async fn back_off<SP: SleepProvider>(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        if !self.schedule.has_attempt_after(attempt) {
            return true;
        }
        let delay = self.schedule.delay_for(attempt);
        #[cfg(feature = "tracing")]
        tracing::trace!(attempt, ?delay, "backing off");
        sleep_or_cancel::<SP>(delay, cancel).await
    }
}
