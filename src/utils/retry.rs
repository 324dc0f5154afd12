//! Bounded retry with backoff
//!
//! One helper used uniformly by the locator's existence checks and the bulk
//! sync downloader, instead of each call site hand-rolling its own
//! sleep-and-loop.

use std::future::Future;
use std::time::Duration;

/// Delay policy between attempts. Both variants add up to 25% random
/// jitter so synchronized retries against the same provider spread out.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Linear(Duration),
    /// Delay doubles after each failed attempt
    Exponential(Duration),
}

impl Backoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = match self {
            Backoff::Linear(d) => *d,
            Backoff::Exponential(d) => {
                d.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            }
        };
        let jitter_cap = (base.as_millis() as u64 / 4).max(1);
        base + Duration::from_millis(fastrand::u64(0..jitter_cap))
    }
}

/// Run `op` up to `max_attempts` times, sleeping per `backoff` between
/// failures. The closure receives the 1-based attempt number. Returns the
/// first success, or the error from the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    backoff: Backoff,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(_) => {
                tokio::time::sleep(backoff.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> =
            retry_with_backoff(3, Backoff::Linear(Duration::from_millis(1)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> =
            retry_with_backoff(3, Backoff::Linear(Duration::from_millis(1)), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("not yet")
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry_with_backoff(2, Backoff::Exponential(Duration::from_millis(1)), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {} failed", attempt)) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "attempt 2 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential(Duration::from_millis(100));
        assert!(backoff.delay_for(1) >= Duration::from_millis(100));
        assert!(backoff.delay_for(2) >= Duration::from_millis(200));
        assert!(backoff.delay_for(3) >= Duration::from_millis(400));
    }
}
