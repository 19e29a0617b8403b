use super::{ConflictClassifier, StoreFailure, message::mentions_uniqueness};

/// SQL-standard class 23 code for `unique_violation`.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// SQLite extended result code `SQLITE_CONSTRAINT_UNIQUE`.
pub const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// SQLite extended result code `SQLITE_CONSTRAINT_PRIMARYKEY`.
pub const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

/// Two-tier classifier for relational backends.
///
/// When the error carries a structured code, the code alone decides: a code
/// other than a known unique-violation code is never a conflict, whatever the
/// message says. Only errors without a code fall back to matching the message
/// text (see [`MessageClassifier`]).
///
/// [`MessageClassifier`]: crate::MessageClassifier
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlStateClassifier;

impl<E> ConflictClassifier<E> for SqlStateClassifier
where
    E: StoreFailure + ?Sized,
{
    fn is_uniqueness_violation(err: &E) -> bool {
        match err.code() {
            Some(code) => is_unique_violation_code(code),
            None => mentions_uniqueness(err),
        }
    }
}

fn is_unique_violation_code(code: &str) -> bool {
    let code = code.trim();
    code == SQLSTATE_UNIQUE_VIOLATION
        || code == SQLITE_CONSTRAINT_UNIQUE
        || code == SQLITE_CONSTRAINT_PRIMARYKEY
}
