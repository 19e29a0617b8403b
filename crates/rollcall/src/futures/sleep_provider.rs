use core::{future::Future, pin::pin, time::Duration};

use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

/// A trait that abstracts over how to sleep for a given [`Duration`] in async
/// contexts.
///
/// This allows the attempt loop to be generic over runtimes like `Tokio` or
/// `Smol`.
pub trait SleepProvider {
    /// We require `Send` so that the future can be safely moved across threads
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps for `dur` unless `cancel` fires first.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub(crate) async fn sleep_or_cancel<S: SleepProvider>(
    dur: Duration,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    let sleep = pin!(S::sleep_for(dur));
    let cancelled = pin!(cancel.cancelled());
    matches!(select(sleep, cancelled).await, Either::Left(_))
}
