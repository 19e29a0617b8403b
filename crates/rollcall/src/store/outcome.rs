use crate::classify::ConflictClassifier;

/// Represents the result of attempting to insert a candidate row.
///
/// - [`InsertOutcome::Inserted`] means the candidate is now the canonical row
///   for its key.
/// - [`InsertOutcome::Conflict`] means another row already holds the key.
/// - [`InsertOutcome::Failed`] carries any other store error.
///
/// Conflicts are routine under load, so they are a value here rather than an
/// error to unwind through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<E> {
    /// The insert succeeded.
    Inserted,
    /// The store reported a uniqueness violation.
    Conflict,
    /// The store failed for an unrelated reason.
    Failed(E),
}

impl<E> InsertOutcome<E> {
    /// Classifies a raw insert result with `C`.
    pub fn classify<C>(result: Result<(), E>) -> Self
    where
        C: ConflictClassifier<E>,
    {
        match result {
            Ok(()) => Self::Inserted,
            Err(err) if C::is_uniqueness_violation(&err) => Self::Conflict,
            Err(err) => Self::Failed(err),
        }
    }
}
