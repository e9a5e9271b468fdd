//! Endpoint descriptor.

use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;

/// A single upstream endpoint as configured.
///
/// Immutable once registered; administrative updates replace the whole
/// descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyEndpoint {
    /// Unique endpoint identifier.
    pub id: String,

    /// Connection target (URL or host:port). Opaque to the pool.
    pub address: String,

    /// Free-form locality tag.
    #[serde(default)]
    pub region: Option<String>,

    /// Relative selection bias (default: 1.0).
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Concurrent lease cap. 0 means unlimited.
    #[serde(default)]
    pub max_concurrent_sessions: usize,

    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit.
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    /// Minimum time an open circuit stays open before a probe.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Outcomes to observe before health scores are trusted.
    #[serde(default)]
    pub warmup_requests: u64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_threshold() -> u32 {
    2
}

fn default_cooldown_seconds() -> u64 {
    10
}

impl ProxyEndpoint {
    /// Create a descriptor with default tuning.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            region: None,
            weight: default_weight(),
            max_concurrent_sessions: 0,
            failure_threshold: default_failure_threshold(),
            recovery_threshold: default_recovery_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
            warmup_requests: 0,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    pub fn with_circuit(mut self, failure_threshold: u32, recovery_threshold: u32, cooldown_seconds: u64) -> Self {
        self.failure_threshold = failure_threshold;
        self.recovery_threshold = recovery_threshold;
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    pub fn with_warmup(mut self, warmup_requests: u64) -> Self {
        self.warmup_requests = warmup_requests;
        self
    }

    /// Cooldown in pool-clock milliseconds.
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_seconds.saturating_mul(1000)
    }

    /// True when the endpoint has a concurrency cap.
    pub fn is_capped(&self) -> bool {
        self.max_concurrent_sessions > 0
    }

    /// Every invariant violation of this descriptor.
    pub fn errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let endpoint = || self.id.clone();

        if self.id.trim().is_empty() {
            errors.push(ValidationError::EmptyField { endpoint: endpoint(), field: "id" });
        }
        if self.address.trim().is_empty() {
            errors.push(ValidationError::EmptyField { endpoint: endpoint(), field: "address" });
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            errors.push(ValidationError::InvalidValue {
                endpoint: endpoint(),
                field: "weight",
                reason: "must be a finite number greater than 0",
            });
        }
        if self.failure_threshold < 1 {
            errors.push(ValidationError::InvalidValue {
                endpoint: endpoint(),
                field: "failure_threshold",
                reason: "must be at least 1",
            });
        }
        if self.recovery_threshold < 1 {
            errors.push(ValidationError::InvalidValue {
                endpoint: endpoint(),
                field: "recovery_threshold",
                reason: "must be at least 1",
            });
        }
        errors
    }

    /// Check the descriptor, returning the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let ep: ProxyEndpoint = toml::from_str(
            r#"
            id = "edge-1"
            address = "10.0.0.1:443"
            "#,
        )
        .unwrap();

        assert_eq!(ep.weight, 1.0);
        assert_eq!(ep.max_concurrent_sessions, 0);
        assert_eq!(ep.failure_threshold, 3);
        assert_eq!(ep.recovery_threshold, 2);
        assert_eq!(ep.cooldown_seconds, 10);
        assert!(ep.region.is_none());
        assert!(ep.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_weight_and_thresholds() {
        let ep = ProxyEndpoint::new("e1", "a:1")
            .with_weight(-1.0)
            .with_circuit(0, 0, 5);

        let errors = ep.errors();
        assert_eq!(errors.len(), 3);
        assert!(matches!(ep.validate(), Err(ValidationError::InvalidValue { field: "weight", .. })));
    }

    #[test]
    fn test_rejects_nan_weight() {
        let ep = ProxyEndpoint::new("e1", "a:1").with_weight(f64::NAN);
        assert!(ep.validate().is_err());
    }
}
