//! Resettable timer for the graph wait.
//!
//! A single `Sleep` is reused across waits. `reset` arms it; after it fires
//! the caller must `drain` it, and waiting on a drained timer never
//! completes. An expiry left over from a previous wait therefore cannot wake
//! the next one early.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

pub struct SyncTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl SyncTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self {
            sleep: Box::pin(sleep(Duration::ZERO)),
            armed: false,
        }
    }

    /// Arm the timer to fire `after` from now, discarding any previous deadline.
    pub fn reset(&mut self, after: Duration) {
        self.sleep.as_mut().reset(Instant::now() + after);
        self.armed = true;
    }

    /// Disarm after firing.
    pub fn drain(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Wait for the armed deadline. Pending forever while disarmed.
    pub async fn fired(&mut self) {
        if !self.armed {
            std::future::pending::<()>().await;
        }
        (&mut self.sleep).await;
    }
}

impl Default for SyncTimer {
    fn default() -> Self {
        Self::new()
    }
}
