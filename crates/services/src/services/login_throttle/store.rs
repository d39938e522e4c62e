use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::time_provider::{SystemTimeProvider, TimeProvider};

/// Where a single key (an email or a client address) stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Open { failures: u32 },
    Locked { remaining: Duration },
}

impl LockState {
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            LockState::Locked { remaining } => Some(*remaining),
            LockState::Open { .. } => None,
        }
    }
}

/// Failed-attempt bookkeeping for one kind of key.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Counts one more failure. A key that is still locked stays locked and
    /// its count is left alone.
    async fn record_failure(&self, key: &str) -> LockState;

    async fn lock_state(&self, key: &str) -> LockState;

    /// Locks the key for `window` starting now and zeroes its count.
    async fn lock(&self, key: &str, window: Duration);

    async fn reset(&self, key: &str);

    /// Drops keys that are neither locked nor holding recent failures.
    /// Returns how many were removed.
    async fn prune(&self) -> usize;
}

/// Failure counts older than this are forgotten.
const IDLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct AttemptEntry {
    failures: u32,
    locked_until: Option<Instant>,
    last_failure: Instant,
}

impl AttemptEntry {
    fn new(now: Instant) -> Self {
        Self {
            failures: 0,
            locked_until: None,
            last_failure: now,
        }
    }

    fn state_at(&mut self, now: Instant) -> LockState {
        match self.locked_until {
            Some(until) if until > now => LockState::Locked {
                remaining: until - now,
            },
            Some(_) => {
                // lock expired
                self.locked_until = None;
                self.failures = 0;
                LockState::Open { failures: 0 }
            }
            None if now.saturating_duration_since(self.last_failure) >= IDLE_TTL => {
                self.failures = 0;
                LockState::Open { failures: 0 }
            }
            None => LockState::Open {
                failures: self.failures,
            },
        }
    }

    fn is_idle(&mut self, now: Instant) -> bool {
        self.state_at(now) == LockState::Open { failures: 0 }
    }
}

/// Process-local store; state is lost on restart.
pub struct MemoryAttemptStore<T: TimeProvider = SystemTimeProvider> {
    entries: DashMap<String, AttemptEntry>,
    time_provider: Arc<T>,
}

impl MemoryAttemptStore<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }
}

impl Default for MemoryAttemptStore<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> MemoryAttemptStore<T> {
    pub fn with_time_provider(time_provider: Arc<T>) -> Self {
        Self {
            entries: DashMap::new(),
            time_provider,
        }
    }
}

#[async_trait]
impl<T: TimeProvider + 'static> AttemptStore for MemoryAttemptStore<T> {
    async fn record_failure(&self, key: &str) -> LockState {
        let now = self.time_provider.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| AttemptEntry::new(now));
        match entry.state_at(now) {
            locked @ LockState::Locked { .. } => locked,
            LockState::Open { .. } => {
                entry.failures = entry.failures.saturating_add(1);
                entry.last_failure = now;
                LockState::Open {
                    failures: entry.failures,
                }
            }
        }
    }

    async fn lock_state(&self, key: &str) -> LockState {
        let now = self.time_provider.now();
        let state = match self.entries.get_mut(key) {
            Some(mut entry) => entry.state_at(now),
            None => return LockState::Open { failures: 0 },
        };
        if state == (LockState::Open { failures: 0 }) {
            self.entries.remove_if(key, |_, entry| {
                entry.locked_until.is_none() && entry.failures == 0
            });
        }
        state
    }

    async fn lock(&self, key: &str, window: Duration) {
        let now = self.time_provider.now();
        self.entries.insert(
            key.to_string(),
            AttemptEntry {
                failures: 0,
                locked_until: Some(now + window),
                last_failure: now,
            },
        );
    }

    async fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn prune(&self) -> usize {
        let now = self.time_provider.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let idle = entry.is_idle(now);
            removed += usize::from(idle);
            !idle
        });
        removed
    }
}
