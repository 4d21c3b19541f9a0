//! Collection readiness probing

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll `probe` until it returns true or `max_wait` has elapsed.
///
/// Returns false on timeout and never fails; callers decide whether to go on
/// anyway. The probe is always called at least once, and once more at the
/// deadline, so a backend that comes up just as time runs out is still seen.
pub async fn wait_until_ready<F, Fut>(
    mut probe: F,
    max_wait: Duration,
    poll_interval: Duration,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start + max_wait;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if probe().await {
            info!(
                attempt,
                waited_ms = start.elapsed().as_millis() as u64,
                "Search collection is ready"
            );
            return true;
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                attempts = attempt,
                max_wait_secs = max_wait.as_secs(),
                "Search collection not ready before deadline"
            );
            return false;
        }

        let sleep_for = poll_interval.min(deadline - now);
        debug!(attempt, retry_in_ms = sleep_for.as_millis() as u64, "Collection not ready yet");
        tokio::time::sleep(sleep_for).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let start = Instant::now();
        let ready = wait_until_ready(
            || async { true },
            Duration::from_secs(120),
            Duration::from_secs(5),
        )
        .await;
        assert!(ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_polls() {
        let calls = Arc::new(AtomicU32::new(0));
        let ready = wait_until_ready(
            || {
                let calls = calls.clone();
                async move { calls.fetch_add(1, Ordering::SeqCst) >= 2 }
            },
            Duration::from_secs(120),
            Duration::from_secs(5),
        )
        .await;
        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_false() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let ready = wait_until_ready(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    false
                }
            },
            Duration::from_secs(12),
            Duration::from_secs(5),
        )
        .await;

        assert!(!ready);
        // probes at 0s, 5s, 10s and the deadline
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_secs(12));
        assert!(start.elapsed() < Duration::from_secs(13));
    }
}
