use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use crate::services::clock::Clock;

/// Minimum-interval gate in front of the quote provider.
///
/// One instance is shared by every caller of the provider. The last-call stamp
/// is held under an async mutex for the whole wait, so concurrent callers are
/// serialized and no two calls are released closer than `min_interval`.
pub struct Throttle {
    /// Return time of the previous `wait()`
    last_call: TokioMutex<Option<Instant>>,
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl Throttle {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            last_call: TokioMutex::new(None),
            min_interval,
            clock,
        }
    }

    /// Suspend until at least `min_interval` has passed since the previous call
    /// returned, then record the new call time. Never fails, only delays.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = self
                .clock
                .now_instant()
                .checked_duration_since(previous)
                .unwrap_or(Duration::ZERO);

            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(wait_ms = wait_time.as_millis() as u64, "Throttle: waiting before next request");
                // Keep the lock while sleeping so the next caller sees our stamp
                self.clock.sleep(wait_time).await;
            }
        }

        *last_call = Some(self.clock.now_instant());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;

    fn throttle_with(clock: &Arc<ManualClock>, millis: u64) -> Throttle {
        Throttle::new(Duration::from_millis(millis), clock.clone())
    }

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let throttle = throttle_with(&clock, 200);

        throttle.wait().await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_calls_wait_exact_interval() {
        let clock = Arc::new(ManualClock::new());
        let throttle = throttle_with(&clock, 200);

        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(200), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_partial_elapsed_waits_remainder() {
        let clock = Arc::new(ManualClock::new());
        let throttle = throttle_with(&clock, 200);

        throttle.wait().await;
        clock.advance(Duration::from_millis(150));
        throttle.wait().await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(50)]);
    }

    #[tokio::test]
    async fn test_no_wait_after_interval_elapsed() {
        let clock = Arc::new(ManualClock::new());
        let throttle = throttle_with(&clock, 200);

        throttle.wait().await;
        clock.advance(Duration::from_secs(1));
        throttle.wait().await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_gap_between_returns_is_at_least_interval() {
        let clock = Arc::new(ManualClock::new());
        let throttle = throttle_with(&clock, 200);

        let mut returns = Vec::new();
        for step in [0u64, 20, 500, 0, 199] {
            clock.advance(Duration::from_millis(step));
            throttle.wait().await;
            returns.push(clock.now_instant());
        }

        for pair in returns.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_callers_are_serialized() {
        let clock = Arc::new(ManualClock::new());
        let throttle = Arc::new(throttle_with(&clock, 200));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = throttle.clone();
                let clock = clock.clone();
                tokio::spawn(async move {
                    throttle.wait().await;
                    clock.now_instant()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        // First caller passes straight through; each of the other three waits a full interval
        assert_eq!(clock.sleeps().len(), 3);
        assert_eq!(clock.total_slept(), Duration::from_millis(600));
    }
}
