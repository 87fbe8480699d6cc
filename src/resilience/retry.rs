//! Fixed-budget retry helper.

use std::future::Future;
use std::time::Duration;

/// Run `f` up to `max_attempts` times, pausing `pause` between
/// attempts. The first `Ok` wins; the last `Err` is returned once the
/// budget is exhausted.
///
/// Cancellation safety: dropping the returned future between attempts
/// stops the loop, so an aborted client connection never keeps
/// retrying upstream.
pub async fn attempt<T, E, F, Fut>(max_attempts: u32, pause: Duration, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts {
                    return Err(e);
                }
                attempts += 1;
                tokio::time::sleep(pause).await;
            }
        }
    }
}
