#[cfg(feature = "async-smol")]
mod smol_sleep;
#[cfg(feature = "async-tokio")]
mod tokio_sleep;

#[cfg(feature = "async-smol")]
pub use smol_sleep::*;
#[cfg(feature = "async-tokio")]
pub use tokio_sleep::*;
