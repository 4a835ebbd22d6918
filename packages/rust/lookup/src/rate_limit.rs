//! Rolling-window rate limiter shared by every outbound lookup call.
//!
//! At most `R` grants in any rolling one-second window. The window is the
//! only gate: a call that stalls after its grant uses up its slot in that
//! window and nothing more. Waiters are served in FIFO order (tokio's mutex
//! is fair).

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Length of the rolling window.
const WINDOW: Duration = Duration::from_secs(1);

/// Bounds outbound calls to a fixed rate. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    rate: usize,
    /// Grant times within the current window, oldest first.
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter granting at most `rate` permits per rolling second.
    /// A rate of zero is treated as one.
    pub fn per_second(rate: u32) -> Self {
        let rate = rate.max(1) as usize;
        Self {
            rate,
            grants: Mutex::new(VecDeque::with_capacity(rate)),
        }
    }

    /// Configured permits per window.
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// Wait until a call may be issued. Never fails, only delays.
    pub async fn acquire(&self) {
        // Holding the lock while sleeping keeps later waiters queued behind us.
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = grants.front() {
                if now.duration_since(oldest) >= WINDOW {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < self.rate {
                grants.push_back(now);
                return;
            }

            // Window full: the oldest grant ages out first.
            let reopen = grants[0] + WINDOW;
            trace!(wait_ms = (reopen - now).as_millis() as u64, "rate limit reached, waiting");
            sleep_until(reopen).await;
        }
    }
}
