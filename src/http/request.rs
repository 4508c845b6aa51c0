//! Request envelope.
//!
//! The parsed request as it travels to a dispatcher, locally or through the
//! broker. Serialized as JSON on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hyper::{HeaderMap, Version};
use serde::{Deserialize, Serialize};

use crate::net::{ClientId, CorrelationId};

/// The only protocol version the dispatcher accepts.
pub const HTTP_11: &str = "HTTP/1.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    pub client: ClientId,
    pub method: String,
    /// Path and query, as received.
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Milliseconds since the Unix epoch.
    pub received_at_ms: u64,
}

impl RequestEnvelope {
    pub fn new(
        correlation_id: CorrelationId,
        client: ClientId,
        parts: &hyper::http::request::Parts,
        body: Bytes,
    ) -> Self {
        Self {
            correlation_id,
            client,
            method: parts.method.as_str().to_string(),
            uri: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            version: version_str(parts.version).to_string(),
            headers: header_pairs(&parts.headers),
            body: body.to_vec(),
            received_at_ms: now_ms(),
        }
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }
}

pub fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => HTTP_11,
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}

/// Headers with non-UTF-8 values dropped.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
