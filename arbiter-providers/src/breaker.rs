//! Per-host circuit breakers
//!
//! One breaker cell per hostname, lazily created, never evicted (the host
//! set is small and bounded). Each cell has its own lock so hosts stay
//! independent; there is no global critical section across hosts.
//!
//! Lifecycle: closed → (failures >= threshold) → open → (cooldown elapsed)
//! → probe allowed → closed on success, re-opened on failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Breaker tuning shared by every host cell.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    /// Consecutive terminal failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before allowing a probe.
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_millis(15_000),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    opened_at: Option<Instant>,
}

/// Breaker cell for a single host.
#[derive(Debug)]
pub struct HostBreaker {
    host: String,
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl HostBreaker {
    fn new(host: String, policy: BreakerPolicy) -> Self {
        Self {
            host,
            policy,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether calls to this host must be rejected right now. Once
    /// `opened_at` is set this stays true until the cooldown elapses; the
    /// first call after that is the probe.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().expect("breaker lock poisoned");
        match state.opened_at {
            Some(opened_at) => opened_at.elapsed() <= self.policy.cooldown,
            None => false,
        }
    }

    /// Record a terminal failure. Counts may overshoot the threshold under
    /// contention, which only re-stamps `opened_at`.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.failures += 1;
        if state.failures >= self.policy.failure_threshold {
            if state.opened_at.is_none() {
                warn!(
                    "circuit breaker opened for {} after {} failures",
                    self.host, state.failures
                );
            }
            state.opened_at = Some(Instant::now());
        }
    }

    /// Record a success: the breaker closes fully and the failure count
    /// starts over.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        if state.opened_at.is_some() {
            debug!("circuit breaker closed for {} after probe success", self.host);
        }
        state.failures = 0;
        state.opened_at = None;
    }

    /// Current consecutive-failure count (test and telemetry hook).
    pub fn failures(&self) -> u32 {
        self.state.lock().expect("breaker lock poisoned").failures
    }
}

/// Process-wide map of host → breaker cell.
#[derive(Debug, Clone)]
pub struct BreakerMap {
    policy: BreakerPolicy,
    inner: Arc<RwLock<HashMap<String, Arc<HostBreaker>>>>,
}

impl BreakerMap {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetch the breaker for a host, creating it on first use.
    pub fn for_host(&self, host: &str) -> Arc<HostBreaker> {
        {
            let map = self.inner.read().expect("breaker map lock poisoned");
            if let Some(breaker) = map.get(host) {
                return Arc::clone(breaker);
            }
        }
        let mut map = self.inner.write().expect("breaker map lock poisoned");
        Arc::clone(
            map.entry(host.to_string())
                .or_insert_with(|| Arc::new(HostBreaker::new(host.to_string(), self.policy))),
        )
    }
}

impl Default for BreakerMap {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}
