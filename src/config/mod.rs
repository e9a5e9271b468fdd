//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PoolConfig (validated, immutable)
//!     → DynamicProxyPool::from_config registers endpoints
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → daemon reconciles the pool's endpoint set
//! ```
//!
//! # Design Decisions
//! - Pool tuning is fixed at startup; only the endpoint list hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::PoolConfig;
pub use schema::PoolSettings;
pub use schema::StrategyKind;
pub use schema::AdminConfig;
pub use schema::ObservabilityConfig;
