//! Circuit breaker for the reasoner (spec §4.4, §5, §8 property 6).
//! State lives in the shared [`Cache`] under `reasoner:circuit:v1` so
//! every worker process observes the same trip/cooldown state.

use serde::{Deserialize, Serialize};

use crate::cache::Cache;

const CIRCUIT_KEY: &str = "reasoner:circuit:v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CircuitState {
    consecutive_failures: u32,
    open_until_epoch_ms: Option<i64>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            open_until_epoch_ms: None,
        }
    }
}

pub struct CircuitBreaker<'a> {
    cache: &'a Cache,
    fail_threshold: u32,
    cooldown: std::time::Duration,
}

impl<'a> CircuitBreaker<'a> {
    pub fn new(cache: &'a Cache, fail_threshold: u32, cooldown: std::time::Duration) -> Self {
        Self {
            cache,
            fail_threshold,
            cooldown,
        }
    }

    async fn state(&self) -> CircuitState {
        self.cache.get_value(CIRCUIT_KEY).await.unwrap_or_default()
    }

    async fn write_state(&self, state: &CircuitState) {
        // TTL = cooldown + 30s (spec §5).
        let ttl = self.cooldown.as_secs() + 30;
        let _ = self.cache.set_value(CIRCUIT_KEY, state, Some(ttl)).await;
    }

    /// True when the breaker is currently open (spec invariant 5).
    pub async fn is_open(&self) -> bool {
        let state = self.state().await;
        match state.open_until_epoch_ms {
            Some(open_until) => open_until > chrono::Utc::now().timestamp_millis(),
            None => false,
        }
    }

    /// Record a reasoner failure; opens the circuit once consecutive
    /// failures reach `fail_threshold` (spec §8 property 6).
    pub async fn record_failure(&self) {
        let mut state = self.state().await;
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.fail_threshold {
            state.open_until_epoch_ms =
                Some(chrono::Utc::now().timestamp_millis() + self.cooldown.as_millis() as i64);
        }
        self.write_state(&state).await;
    }

    /// Record a reasoner success; closes the circuit (spec §4.4: "On
    /// success: ... close circuit").
    pub async fn record_success(&self) {
        self.write_state(&CircuitState::default()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trips_after_threshold_failures() {
        let cache = Cache::new();
        let breaker = CircuitBreaker::new(&cache, 3, Duration::from_millis(200));
        assert!(!breaker.is_open().await);
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
        breaker.record_failure().await;
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn auto_resets_after_cooldown() {
        let cache = Cache::new();
        let breaker = CircuitBreaker::new(&cache, 1, Duration::from_millis(20));
        breaker.record_failure().await;
        assert!(breaker.is_open().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn success_closes_circuit() {
        let cache = Cache::new();
        let breaker = CircuitBreaker::new(&cache, 2, Duration::from_millis(200));
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
    }
}
