//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! sws.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AdmissionConfig, BanPolicy, BrokerConfig, FallbackPolicy, ListenerConfig,
    LogFormat, ObservabilityConfig, RoutingConfig, ServerConfig, WorkerConfig,
};
