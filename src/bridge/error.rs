use std::time::Duration;

use crate::net::CorrelationId;

/// Errors crossing the broker boundary.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The broker cannot be reached or a consumer stream ended.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// A single broker operation failed.
    #[error("broker error: {0}")]
    Broker(String),

    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("no response for {0} within {1:?}")]
    Timeout(CorrelationId, Duration),

    #[error("bridge closed before a response arrived")]
    Closed,
}
