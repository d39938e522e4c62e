use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use tokio::time::Instant;

/// Clock used by attempt stores, swappable so lockout expiry can be tested
/// without sleeping.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Debug)]
pub struct MockTimeProvider {
    current_time: Arc<RwLock<Instant>>,
}

impl MockTimeProvider {
    pub fn new(start_time: Instant) -> Self {
        Self {
            current_time: Arc::new(RwLock::new(start_time)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.write();
        *time += duration;
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self.current_time.read()
    }
}
