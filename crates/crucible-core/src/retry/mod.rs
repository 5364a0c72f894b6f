//! Generic polling primitive: retry a producer at a fixed interval until a
//! predicate holds or a bounded wait elapses.
//!
//! The sleep between attempts is the only suspension point in the core. There
//! is no cooperative cancellation: a call runs to success or timeout. No
//! global default policy exists; interval and bound are per call.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::errors::{CoreError, CoreResult};

/// Poll `produce` until `succeeds` accepts its value or `max_wait` elapses.
///
/// The first attempt runs immediately. A transient error from `produce` is
/// treated as "not yet satisfied" and retried; the attempt in flight when the
/// deadline is crossed still completes and is evaluated. On timeout the last
/// observed unmet value or error is carried in [`CoreError::RetryTimeout`].
pub async fn retry_until<T, P, Fut, S>(
    max_wait: Duration,
    interval: Duration,
    mut produce: P,
    succeeds: S,
) -> CoreResult<T>
where
    T: Debug,
    P: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    S: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let last = match produce().await {
            Ok(value) => {
                if succeeds(&value) {
                    debug!(attempts, "condition met");
                    return Ok(value);
                }
                format!("unmet value: {value:?}")
            }
            Err(err) => format!("transient error: {err:#}"),
        };

        let waited = started.elapsed();
        if waited >= max_wait {
            return Err(CoreError::RetryTimeout {
                waited,
                attempts,
                last,
            });
        }
        debug!(
            attempt = attempts,
            waited_ms = waited.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            %last,
            "condition not met, sleeping"
        );
        sleep(interval).await;
    }
}
