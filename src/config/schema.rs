//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pool
//! daemon. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::registry::ProxyEndpoint;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool-wide tuning.
    pub pool: PoolSettings,

    /// Initial endpoint list.
    pub endpoints: Vec<ProxyEndpoint>,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Which selection strategy the pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Health-biased weighted random.
    #[default]
    WeightedRandom,
    /// Weight-blind rotation.
    RoundRobin,
}

/// Pool-wide tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// EWMA smoothing factor.
    pub ewma_alpha: f64,

    /// Latency at which the score is halved for a perfectly healthy endpoint.
    pub latency_reference_ms: f64,

    /// Floor for scores during selection.
    pub score_epsilon: f64,

    /// Lease lifetime in seconds.
    pub lease_ttl_secs: u64,

    /// Idle lifetime of a sticky binding in seconds.
    pub sticky_ttl_secs: u64,

    /// Expiry sweep interval in seconds.
    pub sweep_interval_secs: u64,

    /// Selection strategy.
    pub strategy: StrategyKind,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.2,
            latency_reference_ms: 100.0,
            score_epsilon: 0.01,
            lease_ttl_secs: 30,
            sticky_ttl_secs: 300,
            sweep_interval_secs: 5,
            strategy: StrategyKind::default(),
        }
    }
}

impl PoolSettings {
    pub fn lease_ttl_ms(&self) -> u64 {
        self.lease_ttl_secs.saturating_mul(1000)
    }

    pub fn sticky_ttl_ms(&self) -> u64 {
        self.sticky_ttl_secs.saturating_mul(1000)
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: PoolConfig = toml::from_str(
            r#"
            [pool]
            ewma_alpha = 0.3
            strategy = "round_robin"

            [[endpoints]]
            id = "eu-1"
            address = "eu-1.edge:443"
            region = "eu"
            weight = 3.0
            max_concurrent_sessions = 50

            [[endpoints]]
            id = "us-1"
            address = "us-1.edge:443"

            [admin]
            enabled = true
            api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.ewma_alpha, 0.3);
        assert_eq!(config.pool.latency_reference_ms, 100.0);
        assert_eq!(config.pool.strategy, StrategyKind::RoundRobin);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].region.as_deref(), Some("eu"));
        assert_eq!(config.endpoints[1].weight, 1.0);
        assert!(config.admin.enabled);
        assert_eq!(config.admin.bind_address, "127.0.0.1:8081");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: PoolConfig = toml::from_str("").unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.pool.lease_ttl_ms(), 30_000);
        assert_eq!(config.pool.strategy, StrategyKind::WeightedRandom);
    }
}
