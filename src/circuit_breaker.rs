use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

/// Circuit breaker for the calls against one relation.
pub type StoreCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for record store reads to prevent cascading failures.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast with [`StoreError::Rejected`].
/// - **HALF_OPEN**: Testing if the store recovered.
pub fn create_store_circuit_breaker() -> StoreCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// One breaker per relation a store backend reads.
///
/// A burst of failing lead probes must not reject the transfer-view fallback
/// of the same search, so failures are only counted against the relation that
/// produced them.
pub struct StoreBreakers {
    pub leads: StoreCircuitBreaker,
    pub opportunities: StoreCircuitBreaker,
    pub transfer_view: StoreCircuitBreaker,
}

impl StoreBreakers {
    pub fn new() -> Self {
        Self {
            leads: create_store_circuit_breaker(),
            opportunities: create_store_circuit_breaker(),
            transfer_view: create_store_circuit_breaker(),
        }
    }
}

impl Default for StoreBreakers {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `call` through the breaker, recording its outcome.
pub async fn guarded<T, F>(breaker: &StoreCircuitBreaker, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if !breaker.is_call_permitted() {
        tracing::warn!("Store circuit breaker open, rejecting call");
        return Err(StoreError::Rejected);
    }

    match call.await {
        Ok(value) => {
            breaker.on_success();
            Ok(value)
        }
        Err(e) => {
            breaker.on_error();
            Err(e)
        }
    }
}
