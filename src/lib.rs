//! Fair, plugin-routed request server.
//!
//! Connections pass an admission gate, wait in a round-robin queue across
//! clients, and run on a bounded worker pool. Each request is routed to a
//! plugin from a hot-reloaded registry, either in-process or on remote
//! workers behind a message broker.

pub mod admin;
pub mod bridge;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plugins;
pub mod resilience;
pub mod routing;
pub mod scheduler;
pub mod security;

pub use config::schema::ServerConfig;
pub use http::Server;
pub use lifecycle::Shutdown;
