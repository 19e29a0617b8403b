use core::fmt;

/// The view of a store error that classification needs.
///
/// Backends implement this for their error type. `code` is the structured,
/// backend-specific error code when the driver exposes one (a SQLSTATE such as
/// `23505`, or a SQLite extended result code). The `Display` text is used as
/// a fallback when no code is available.
///
/// # Example
/// ```
/// use rollcall::StoreFailure;
///
/// #[derive(Debug)]
/// struct PgError {
///     sqlstate: Option<String>,
///     message: String,
/// }
///
/// impl core::fmt::Display for PgError {
///     fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
///         f.write_str(&self.message)
///     }
/// }
///
/// impl StoreFailure for PgError {
///     fn code(&self) -> Option<&str> {
///         self.sqlstate.as_deref()
///     }
/// }
/// ```
pub trait StoreFailure: fmt::Display {
    /// Returns the structured error code, if the backend reports one.
    fn code(&self) -> Option<&str> {
        None
    }
}

/// Decides whether a store error is a uniqueness-constraint violation.
///
/// Each backend picks one implementation at compile time through
/// [`Store::Classifier`]. Implementations must lean towards `false`: treating
/// a real conflict as an unknown error only surfaces a failure, while treating
/// an unknown error as a conflict would send the caller into the recovery
/// path for a failure it cannot recover from.
///
/// [`Store::Classifier`]: crate::Store::Classifier
pub trait ConflictClassifier<E: ?Sized> {
    /// Returns `true` if `err` reports a uniqueness violation.
    fn is_uniqueness_violation(err: &E) -> bool;
}
