//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (alpha in (0,1], weights > 0, thresholds >= 1)
//! - Detect duplicate endpoint ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PoolConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{PoolConfig, PoolSettings};

/// A single semantic problem with the configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("endpoint '{endpoint}': {field} must not be empty")]
    EmptyField { endpoint: String, field: &'static str },

    #[error("endpoint '{endpoint}': {field} {reason}")]
    InvalidValue {
        endpoint: String,
        field: &'static str,
        reason: &'static str,
    },

    #[error("endpoint '{0}' is defined more than once")]
    DuplicateEndpoint(String),

    #[error("pool.{field} {reason}")]
    InvalidSetting { field: &'static str, reason: &'static str },
}

/// Validate pool-wide tuning.
pub fn validate_settings(settings: &PoolSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !(settings.ewma_alpha > 0.0 && settings.ewma_alpha <= 1.0) {
        errors.push(ValidationError::InvalidSetting {
            field: "ewma_alpha",
            reason: "must be in (0, 1]",
        });
    }
    if !(settings.latency_reference_ms.is_finite() && settings.latency_reference_ms > 0.0) {
        errors.push(ValidationError::InvalidSetting {
            field: "latency_reference_ms",
            reason: "must be greater than 0",
        });
    }
    if !(settings.score_epsilon.is_finite() && settings.score_epsilon > 0.0) {
        errors.push(ValidationError::InvalidSetting {
            field: "score_epsilon",
            reason: "must be greater than 0",
        });
    }
    if settings.lease_ttl_secs == 0 {
        errors.push(ValidationError::InvalidSetting {
            field: "lease_ttl_secs",
            reason: "must be at least 1",
        });
    }
    if settings.sweep_interval_secs == 0 {
        errors.push(ValidationError::InvalidSetting {
            field: "sweep_interval_secs",
            reason: "must be at least 1",
        });
    }
    errors
}

/// Validate a full configuration, collecting every error.
pub fn validate_config(config: &PoolConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_settings(&config.pool);

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        errors.extend(endpoint.errors());
        if !seen.insert(endpoint.id.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
