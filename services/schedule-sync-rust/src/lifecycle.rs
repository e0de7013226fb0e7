//! Opportunistic cache sweep and connection recycling, driven by orchestrator
//! entry points rather than a background timer.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::client::ScheduleClient;
use crate::http::Transport;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub struct LifecycleManager {
    interval: Duration,
    last_cleanup: Mutex<Instant>,
}

impl LifecycleManager {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    /// Run cleanup if more than `interval` has passed since the last one.
    /// Returns whether it ran.
    pub fn maybe_cleanup<T: Transport>(&self, client: &ScheduleClient<T>) -> bool {
        let mut last = match self.last_cleanup.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let elapsed = last.elapsed();
        if elapsed <= self.interval {
            return false;
        }
        debug!("{:?} since last cleanup; running", elapsed);
        client.cleanup_connections();
        *last = Instant::now();
        true
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_INTERVAL)
    }
}
