//! # Convergence poller.
//!
//! Every "wait until X" in the controller funnels through [`Poller::converge`]:
//!
//! ```text
//! start ──► sample(op) ──► accept(value)? ──yes──► Ok(value)
//!             ▲     │           │no
//!             │     └─err───────┤ (remember last value / last error)
//!             │                 ▼
//!             └──── sleep(pacing) ◄── deadline left?  ──no──► Err(Timeout)
//! ```
//!
//! ## Rules
//! - The first sample runs immediately, with no leading sleep.
//! - Each sample is bounded by the remaining deadline; a sample that hangs past it
//!   counts as the final sample.
//! - Errors from `op` never abort the loop; they only become the "last error".
//! - On timeout the caller gets the last observed value and the last error, so the
//!   message can say what was seen instead of a bare "timed out".

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};

use super::pacing::Pacing;

/// Deadline reached before the condition held.
#[derive(Debug)]
pub struct Timeout<T, E> {
    /// Time spent polling.
    pub waited: Duration,
    /// Last value `op` returned, if it ever succeeded.
    pub last_value: Option<T>,
    /// Last error `op` returned, if it ever failed.
    pub last_error: Option<E>,
}

impl<T, E> Timeout<T, E> {
    /// Drops the value half, keeping the last error.
    pub fn into_last_error(self) -> Option<E> {
        self.last_error
    }
}

impl<T: fmt::Debug, E: fmt::Display> fmt::Display for Timeout<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition not met after {:?}", self.waited)?;
        if let Some(value) = &self.last_value {
            write!(f, "; last value: {value:?}")?;
        }
        if let Some(err) = &self.last_error {
            write!(f, "; last error: {err}")?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug, E: fmt::Debug + fmt::Display> std::error::Error for Timeout<T, E> {}

/// Repeats an operation until it converges or a deadline passes.
#[derive(Clone, Copy, Debug)]
pub struct Poller {
    pacing: Pacing,
    timeout: Duration,
}

impl Poller {
    /// Fixed `interval` between samples, giving up after `timeout`.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            pacing: Pacing::constant(interval),
            timeout,
        }
    }

    pub fn with_pacing(pacing: Pacing, timeout: Duration) -> Self {
        Self { pacing, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Samples `op` until `accept` holds for a returned value.
    pub async fn converge<T, E, F, Fut, A>(&self, mut op: F, mut accept: A) -> Result<T, Timeout<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: FnMut(&T) -> bool,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut last_value = None;
        let mut last_error = None;
        let mut attempt: u32 = 0;

        loop {
            match time::timeout_at(deadline, op()).await {
                Ok(Ok(value)) => {
                    if accept(&value) {
                        return Ok(value);
                    }
                    last_value = Some(value);
                }
                Ok(Err(err)) => last_error = Some(err),
                Err(_) => break,
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let pause = self.pacing.next(attempt).min(deadline - now);
            attempt = attempt.saturating_add(1);
            time::sleep(pause).await;
        }

        Err(Timeout {
            waited: started.elapsed(),
            last_value,
            last_error,
        })
    }

    /// Samples `op` until it returns `Ok`.
    pub async fn no_error<T, E, F, Fut>(&self, op: F) -> Result<T, Timeout<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.converge(op, |_| true).await
    }

    /// Samples an infallible predicate until it returns `true`.
    pub async fn predicate<F, Fut>(&self, mut check: F) -> Result<(), Timeout<bool, std::convert::Infallible>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.converge(
            || {
                let fut = check();
                async move { Ok(fut.await) }
            },
            |ok| *ok,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_is_immediate() {
        let poller = Poller::new(Duration::from_secs(5), Duration::from_secs(60));
        let started = Instant::now();
        let v: Result<u32, Timeout<u32, String>> = poller.no_error(|| async { Ok(7) }).await;
        assert_eq!(v.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let poller = Poller::new(Duration::from_millis(20), Duration::from_secs(1));
        let out = poller
            .no_error(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(format!("refused #{n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_value_and_error() {
        let n = Cell::new(0u32);
        let poller = Poller::new(Duration::from_millis(20), Duration::from_millis(100));
        let err = poller
            .converge(
                || {
                    let i = n.get();
                    n.set(i + 1);
                    async move { if i % 2 == 0 { Ok(i) } else { Err("odd") } }
                },
                |v| *v > 1_000,
            )
            .await
            .unwrap_err();

        assert!(err.last_value.is_some());
        assert_eq!(err.last_error, Some("odd"));
        assert!(err.waited >= Duration::from_millis(100));
        assert!(err.to_string().contains("last error: odd"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_sample_is_bounded_by_deadline() {
        let poller = Poller::new(Duration::from_millis(20), Duration::from_millis(50));
        let started = Instant::now();
        let err = poller
            .no_error(|| async {
                std::future::pending::<()>().await;
                Ok::<(), String>(())
            })
            .await
            .unwrap_err();
        assert!(err.last_error.is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(50) && waited < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_geometric_pacing_backs_off_to_cap() {
        let calls = AtomicU32::new(0);
        let pacing = Pacing {
            first: Duration::from_millis(10),
            max: Duration::from_millis(40),
            factor: 2.0,
        };
        let poller = Poller::with_pacing(pacing, Duration::from_secs(1));
        let started = Instant::now();
        let out = poller
            .no_error(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 4 { Err("refused") } else { Ok(n) } }
            })
            .await;
        assert_eq!(out.unwrap(), 4);
        // 10 + 20 + 40 + 40
        assert_eq!(started.elapsed(), Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate() {
        let n = Cell::new(0u32);
        let poller = Poller::new(Duration::from_millis(10), Duration::from_secs(1));
        poller
            .predicate(|| {
                n.set(n.get() + 1);
                let done = n.get() >= 5;
                async move { done }
            })
            .await
            .unwrap();
        assert_eq!(n.get(), 5);
    }
}
