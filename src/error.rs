//! Pool error taxonomy.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors returned by pool operations.
///
/// None of these are retried internally; retry policy belongs to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    /// An endpoint with this id is already registered.
    #[error("endpoint '{0}' is already registered")]
    DuplicateId(String),

    /// No endpoint with this id is registered.
    #[error("endpoint '{0}' not found")]
    NotFound(String),

    /// Deregistration blocked by outstanding leases.
    #[error("endpoint '{id}' has {active_leases} active lease(s); drain or force-expire first")]
    InUse { id: String, active_leases: usize },

    /// Every endpoint is open (or none are registered).
    #[error("no eligible endpoint")]
    NoEligibleEndpoint,

    /// Endpoints are healthy but all at capacity.
    #[error("all eligible endpoints are at capacity")]
    PoolExhausted,

    /// Descriptor violates a registration contract.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] ValidationError),
}

impl PoolError {
    /// Transient errors worth a retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::PoolExhausted)
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::DuplicateId(_) => "duplicate_id",
            PoolError::NotFound(_) => "not_found",
            PoolError::InUse { .. } => "in_use",
            PoolError::NoEligibleEndpoint => "no_eligible_endpoint",
            PoolError::PoolExhausted => "pool_exhausted",
            PoolError::InvalidEndpoint(_) => "invalid_endpoint",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exhaustion_is_retryable() {
        assert!(PoolError::PoolExhausted.is_retryable());
        assert!(!PoolError::NoEligibleEndpoint.is_retryable());
        assert!(!PoolError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = PoolError::InUse { id: "e1".into(), active_leases: 2 };
        assert_eq!(
            err.to_string(),
            "endpoint 'e1' has 2 active lease(s); drain or force-expire first"
        );
    }
}
