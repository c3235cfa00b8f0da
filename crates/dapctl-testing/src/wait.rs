//! Polling helpers for asserting on state that settles asynchronously

use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Returns the last observed value of `condition`.
pub async fn eventually<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return condition();
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_eventually_sees_late_change() {
        let calls = AtomicUsize::new(0);
        let settled = eventually(
            || calls.fetch_add(1, Ordering::SeqCst) >= 3,
            Duration::from_secs(1),
        )
        .await;
        assert!(settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_gives_up() {
        assert!(!eventually(|| false, Duration::from_millis(50)).await);
    }
}
