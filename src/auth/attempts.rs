//! Failed-login accounting and lockout.
//!
//! Flow Overview:
//! 1) Each failed verification bumps the identity's counter by one.
//! 2) Reaching the threshold locks the identity and stamps the lock time.
//! 3) A success, an explicit reset, or the cooldown elapsing lifts the lock.
//!
//! Counters live in memory only and are lost on restart. Every
//! read-modify-write goes through the map's entry API so two concurrent
//! failures can never both observe the same count.
//!
//! A counter whose last failure is older than twice the cooldown is dropped
//! by a sweep that runs at most once per cooldown, so keys that are never
//! retried do not accumulate. Locks without a cooldown are never swept.

use dashmap::DashMap;
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct Counter {
    failures: u32,
    last_failure: Instant,
    locked_at: Option<Instant>,
}

impl Counter {
    fn new() -> Self {
        Self {
            failures: 0,
            last_failure: Instant::now(),
            locked_at: None,
        }
    }
}

#[derive(Debug)]
pub struct AttemptTracker {
    threshold: u32,
    /// Zero keeps a lock until reset or success.
    cooldown: Duration,
    counters: DashMap<String, Counter>,
    last_sweep: Mutex<Instant>,
}

impl AttemptTracker {
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            counters: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one failed attempt and return the new consecutive total.
    pub fn record_failure(&self, identity_key: &str) -> u32 {
        self.sweep_if_due();

        let mut entry = self
            .counters
            .entry(identity_key.to_string())
            .or_insert_with(Counter::new);
        entry.failures = entry.failures.saturating_add(1);
        entry.last_failure = Instant::now();
        if entry.failures >= self.threshold {
            if entry.failures == self.threshold {
                warn!(
                    identity = identity_key,
                    failures = entry.failures,
                    "identity locked after consecutive failures"
                );
            }
            entry.locked_at = Some(Instant::now());
        }
        entry.failures
    }

    pub fn record_success(&self, identity_key: &str) {
        self.counters.remove(identity_key);
    }

    /// External reset, e.g. from an operator.
    pub fn reset(&self, identity_key: &str) {
        if self.counters.remove(identity_key).is_some() {
            info!(identity = identity_key, "failed-attempt counter reset");
        }
    }

    #[must_use]
    pub fn is_locked(&self, identity_key: &str) -> bool {
        let Some(counter) = self.counters.get(identity_key) else {
            return false;
        };
        if counter.failures < self.threshold {
            return false;
        }
        match counter.locked_at {
            Some(locked_at) if !self.cooldown.is_zero() => locked_at.elapsed() < self.cooldown,
            _ => true,
        }
    }

    #[must_use]
    pub fn failures(&self, identity_key: &str) -> u32 {
        self.counters
            .get(identity_key)
            .map_or(0, |counter| counter.failures)
    }

    /// Number of identities with a live counter.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }

    /// Drop idle counters now and return how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.counters.len();
        let retention = self.window().saturating_mul(2);
        self.counters.retain(|_, counter| {
            let permanent = self.cooldown.is_zero() && counter.failures >= self.threshold;
            permanent || counter.last_failure.elapsed() < retention
        });
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed, "swept idle failed-attempt counters");
        }
        removed
    }

    fn sweep_if_due(&self) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if last_sweep.elapsed() < self.window() {
            return;
        }
        *last_sweep = Instant::now();
        drop(last_sweep);
        self.sweep();
    }

    /// Idle window for counters; falls back to the default cooldown when
    /// locks never expire.
    fn window(&self) -> Duration {
        if self.cooldown.is_zero() {
            DEFAULT_LOCKOUT_COOLDOWN
        } else {
            self.cooldown
        }
    }
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOCKOUT_THRESHOLD, DEFAULT_LOCKOUT_COOLDOWN)
    }
}
