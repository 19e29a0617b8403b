use core::{fmt, future::Future};

use crate::classify::ConflictClassifier;

/// A row that can be created through the attempt loop.
pub trait Record: Clone + Send + Sync {
    /// The tuple the store's uniqueness constraint covers.
    type Key: Clone + Eq + Ord + fmt::Debug + Send + Sync;

    /// Returns this row's uniqueness key.
    fn key(&self) -> Self::Key;
}

/// A row whose winner can be looked up after a conflicting insert.
pub trait Recoverable: Record {
    /// Describes which persisted row the recovery path adopts.
    type Lookup: fmt::Debug + Send + Sync;

    /// Returns `true` if this row satisfies `lookup`.
    fn matches(&self, lookup: &Self::Lookup) -> bool;
}

/// The persistence layer's insert operation for rows of type `R`.
///
/// The store is an external collaborator: this crate relies on it to enforce
/// the uniqueness constraint on [`Record::Key`] atomically and to report a
/// violation in a way [`Self::Classifier`] recognises.
pub trait Store<R: Record>: Send + Sync {
    /// The backend's error type.
    type Error: fmt::Debug + fmt::Display + Send;

    /// How this backend's errors are classified. Chosen per backend at
    /// compile time.
    type Classifier: ConflictClassifier<Self::Error>;

    /// Persists `row`, failing if a row with the same key already exists.
    fn insert(&self, row: &R) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Point lookup used to recover the winning row after a conflict.
pub trait LookupStore<R: Recoverable>: Store<R> {
    /// Returns a persisted row matching `lookup`, if one is visible.
    fn find(&self, lookup: &R::Lookup)
    -> impl Future<Output = Result<Option<R>, Self::Error>> + Send;
}
