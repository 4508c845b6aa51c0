//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server and its remote workers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-client abuse control.
    pub admission: AdmissionConfig,

    /// Worker pool sizing.
    pub workers: WorkerConfig,

    /// Route resolution and plugin discovery.
    pub routing: RoutingConfig,

    /// Remote worker bridge (distributed mode).
    pub broker: BrokerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admission gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum outstanding (pending + active) requests per client.
    /// The connection that would exceed it gets the client banned.
    pub max_requests_per_client: usize,

    /// How long a ban lasts.
    pub ban: BanPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_requests_per_client: 10,
            ban: BanPolicy::Permanent,
        }
    }
}

/// Ban duration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BanPolicy {
    /// Banned for the lifetime of the process.
    Permanent,
    /// Banned for a fixed number of seconds.
    Expiring { seconds: u64 },
}

impl BanPolicy {
    /// Ban duration, `None` meaning forever.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            BanPolicy::Permanent => None,
            BanPolicy::Expiring { seconds } => Some(Duration::from_secs(*seconds)),
        }
    }
}

impl Default for BanPolicy {
    fn default() -> Self {
        BanPolicy::Permanent
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum requests processed concurrently.
    pub capacity: usize,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// What to do when no plugin owns the requested route name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Answer 400.
    #[default]
    Reject,
    /// Serve the whole path as a static file under the server root.
    Static,
}

/// Routing and plugin discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Server content root. Each plugin gets `<root>/<kind>` as its own root.
    pub root_directory: PathBuf,

    /// Directory holding handler packages (`*.toml` manifests).
    pub plugin_directory: PathBuf,

    /// Literal path segment that marks a versioned URI (e.g. `/v1/hello/...`).
    pub version_marker: String,

    /// Segments ending with this suffix name a sub-route inside a plugin.
    pub sub_route_suffix: String,

    /// Behaviour for unknown route names.
    pub fallback: FallbackPolicy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::from("web"),
            plugin_directory: PathBuf::from("plugins"),
            version_marker: "v1".to_string(),
            sub_route_suffix: "Servlet".to_string(),
            fallback: FallbackPolicy::Reject,
        }
    }
}

/// Message broker configuration for distributed mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Publish requests to remote workers instead of dispatching locally.
    pub enabled: bool,

    /// NATS server URL.
    pub url: String,

    /// Subject carrying serialized request envelopes.
    pub request_subject: String,

    /// Subject carrying serialized response envelopes.
    pub response_subject: String,

    /// Durable stream backing the request subject.
    pub request_stream: String,

    /// Durable stream backing the response subject.
    pub response_stream: String,

    /// Durable consumer shared by all worker processes.
    pub worker_consumer: String,

    /// Durable consumer used by the bridge to collect responses.
    pub bridge_consumer: String,

    /// Unacknowledged deliveries a single consumer may hold.
    pub prefetch: usize,

    /// How long a connection waits for its remote response.
    pub response_timeout_secs: u64,

    /// Connection attempts before the broker is declared unavailable.
    pub connect_attempts: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://127.0.0.1:4222".to_string(),
            request_subject: "sws.requests".to_string(),
            response_subject: "sws.responses".to_string(),
            request_stream: "SWS_REQUESTS".to_string(),
            response_stream: "SWS_RESPONSES".to_string(),
            worker_consumer: "sws-workers".to_string(),
            bridge_consumer: "sws-bridge".to_string(),
            prefetch: 1,
            response_timeout_secs: 30,
            connect_attempts: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
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
