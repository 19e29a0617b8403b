/// A trait for random sources that return random integers.
///
/// This abstraction allows you to plug in a real random source or a scripted
/// random source in tests.
///
/// The random type `T` is generic (the code generator draws `u8`).
///
/// # Example
/// ```
/// use rollcall::RandSource;
///
/// struct FixedRand;
/// impl RandSource<u8> for FixedRand {
///     fn rand(&self) -> u8 {
///         7
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand(), 7);
/// ```
pub trait RandSource<T> {
    /// Returns a random integer.
    fn rand(&self) -> T;
}
