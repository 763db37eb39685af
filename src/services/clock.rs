//! Time source for the throttle, the pipeline timestamps and the scheduler.
//!
//! Production code uses [`SystemClock`]. Tests use `ManualClock`, whose
//! `sleep` advances virtual time instead of waiting, so wait durations can be
//! asserted exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

#[cfg(test)]
use chrono::Duration as ChronoDuration;
#[cfg(test)]
use std::sync::Mutex;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time, used for interval arithmetic
    fn now_instant(&self) -> Instant;

    /// Wall-clock time, used for fire times and stored timestamps
    fn now_utc(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_utc: DateTime<Utc>,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(start: DateTime<Utc>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_utc: start,
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.lock().expect("manual clock poisoned");
        *offset = offset.saturating_add(delta);
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("manual clock poisoned").clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    fn chrono_offset(&self) -> ChronoDuration {
        let offset = self.offset.lock().expect("manual clock poisoned");
        ChronoDuration::from_std(*offset).unwrap_or_else(|_| ChronoDuration::zero())
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn now_instant(&self) -> Instant {
        let offset = self.offset.lock().expect("manual clock poisoned");
        self.base_instant + *offset
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.base_utc + self.chrono_offset()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .expect("manual clock poisoned")
            .push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let clock = ManualClock::from_datetime(start);
        let before = clock.now_instant();

        clock.sleep(Duration::from_secs(90)).await;

        assert_eq!(clock.now_instant() - before, Duration::from_secs(90));
        assert_eq!(clock.now_utc(), start + ChronoDuration::seconds(90));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
    }
}
