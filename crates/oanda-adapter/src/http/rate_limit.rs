/*
[INPUT]:  Minimum inter-request interval
[OUTPUT]: Suspension until the next request may start
[POS]:    HTTP layer - fixed-floor request spacing
[UPDATE]: When changing spacing semantics or timestamp bookkeeping
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spacing applied when the caller does not configure one
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Enforces a fixed floor between consecutive request starts.
///
/// No burst allowance and no jitter. The recorded timestamp is taken after any
/// sleep, right before the request goes out, so the floor is measured start to start.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval_nanos: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval_nanos: AtomicU64::new(duration_to_nanos(min_interval)),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_nanos(self.min_interval_nanos.load(Ordering::Acquire))
    }

    /// Reconfigure the floor for every subsequent `wait`
    pub fn set_interval(&self, min_interval: Duration) {
        self.min_interval_nanos
            .store(duration_to_nanos(min_interval), Ordering::Release);
    }

    /// Suspend until the floor has elapsed since the previous start, then
    /// record and return the new start time.
    pub async fn wait(&self) -> Instant {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval();
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        let started = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(started);
        started
    }

    /// Timestamp recorded by the most recent `wait`
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
