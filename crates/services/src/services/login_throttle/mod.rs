//! Login rate limiting. Failures are tracked separately per email and per
//! client address; tripping either one locks both.

mod store;
mod time_provider;

use std::{sync::Arc, time::Duration};

pub use store::{AttemptStore, LockState, MemoryAttemptStore};
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};

use super::config::LoginThrottleConfig;

#[derive(Clone)]
pub struct LoginThrottle {
    email_store: Arc<dyn AttemptStore>,
    ip_store: Arc<dyn AttemptStore>,
    max_attempts: u32,
    lockout: Duration,
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle")
            .field("max_attempts", &self.max_attempts)
            .field("lockout", &self.lockout)
            .finish_non_exhaustive()
    }
}

impl LoginThrottle {
    pub fn new(
        email_store: Arc<dyn AttemptStore>,
        ip_store: Arc<dyn AttemptStore>,
        config: &LoginThrottleConfig,
    ) -> Self {
        Self {
            email_store,
            ip_store,
            max_attempts: config.max_attempts.max(1),
            lockout: config.lockout,
        }
    }

    /// Two fresh in-memory stores on the system clock.
    pub fn in_memory(config: &LoginThrottleConfig) -> Self {
        Self::new(
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(MemoryAttemptStore::new()),
            config,
        )
    }

    /// Returns the longest remaining lockout if either key is locked.
    pub async fn check(&self, email: &str, ip: &str) -> Result<(), Duration> {
        let email_state = self.email_store.lock_state(email).await;
        let ip_state = self.ip_store.lock_state(ip).await;
        match email_state.remaining().max(ip_state.remaining()) {
            Some(remaining) => Err(remaining),
            None => Ok(()),
        }
    }

    /// Records a failed attempt against both keys. Returns the lockout window
    /// when this attempt reached the threshold on either key.
    pub async fn record_failure(&self, email: &str, ip: &str) -> Option<Duration> {
        let email_state = self.email_store.record_failure(email).await;
        let ip_state = self.ip_store.record_failure(ip).await;

        if let Some(remaining) = email_state.remaining().max(ip_state.remaining()) {
            return Some(remaining);
        }

        let tripped = [email_state, ip_state].iter().any(
            |state| matches!(state, LockState::Open { failures } if *failures >= self.max_attempts),
        );
        if !tripped {
            return None;
        }

        self.email_store.lock(email, self.lockout).await;
        self.ip_store.lock(ip, self.lockout).await;
        Some(self.lockout)
    }

    pub async fn record_success(&self, email: &str, ip: &str) {
        self.email_store.reset(email).await;
        self.ip_store.reset(ip).await;
    }

    /// Forgets keys with no live lock and no recent failures.
    pub async fn prune(&self) -> usize {
        self.email_store.prune().await + self.ip_store.prune().await
    }
}

/// Whole seconds for a `Retry-After` style message, never below one.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}
