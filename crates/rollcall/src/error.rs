/// A result type carrying the crate's [`Error`].
pub type Result<T, K, E> = core::result::Result<T, Error<K, E>>;

/// Failures that cross the boundary of an idempotent create or issue call.
///
/// `K` identifies what the caller asked for (an [`OccurrenceKey`] or an issue
/// date) and `E` is the store's own error type.
///
/// Conflicts and race-window misses never appear here: they are recovered
/// inside the attempt loop. Only three things escape it.
///
/// [`OccurrenceKey`]: crate::OccurrenceKey
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error<K, E> {
    /// Every attempt ended in a uniqueness conflict that could not be
    /// resolved.
    ///
    /// Under light load this almost always means the store is missing the
    /// uniqueness constraint the loop depends on, rather than real contention.
    #[error("unable to resolve {key} after {attempts} attempts")]
    RetriesExhausted {
        /// What the caller asked for.
        key: K,
        /// How many inserts were attempted.
        attempts: u32,
    },

    /// The store failed with something other than a uniqueness violation.
    ///
    /// These are surfaced on first sight and never retried.
    #[error("store error: {0}")]
    Store(E),

    /// The caller's cancellation token fired before the call resolved.
    #[error("cancelled while resolving {key}")]
    Cancelled {
        /// What the caller asked for.
        key: K,
    },
}

impl<K, E> Error<K, E> {
    /// Returns `true` if the attempt budget was consumed.
    pub const fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// Returns `true` if the call was cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The key the failing call was resolving, if the variant carries one.
    pub const fn key(&self) -> Option<&K> {
        match self {
            Self::RetriesExhausted { key, .. } | Self::Cancelled { key } => Some(key),
            Self::Store(_) => None,
        }
    }

    /// The underlying store error, if this is [`Error::Store`].
    pub const fn store_error(&self) -> Option<&E> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}
