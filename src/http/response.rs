//! Response envelope.
//!
//! Every response carries the correlation id of its request and the
//! measured service time, both on the envelope and as response headers.

use std::time::Duration;

use axum::body::Body;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::request::header_pairs;
use crate::net::CorrelationId;
use crate::plugins::Reply;

pub const X_CORRELATION_ID: &str = "x-correlation-id";
pub const X_SERVICE_TIME_MS: &str = "x-service-time-ms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub correlation_id: CorrelationId,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub service_time_us: u64,
}

impl ResponseEnvelope {
    pub fn from_reply(correlation_id: CorrelationId, reply: Reply, service_time: Duration) -> Self {
        Self {
            correlation_id,
            status: reply.status.as_u16(),
            headers: header_pairs(&reply.headers),
            body: reply.body.to_vec(),
            service_time_us: service_time.as_micros() as u64,
        }
    }

    /// Plain-text response for failures that never reached a handler.
    pub fn error(correlation_id: CorrelationId, status: StatusCode, message: &str) -> Self {
        Self {
            correlation_id,
            status: status.as_u16(),
            headers: vec![(
                CONTENT_TYPE.as_str().to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: format!("{message}\n").into_bytes(),
            service_time_us: 0,
        }
    }

    pub fn service_time(&self) -> Duration {
        Duration::from_micros(self.service_time_us)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Build the wire response. The connection is always closed afterwards.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                if name != CONTENT_LENGTH {
                    headers.append(name, value);
                }
            }
        }
        if let Ok(value) = HeaderValue::from_str(&self.correlation_id.to_string()) {
            headers.insert(X_CORRELATION_ID, value);
        }
        let millis = self.service_time_us as f64 / 1_000.0;
        if let Ok(value) = HeaderValue::from_str(&format!("{millis:.3}")) {
            headers.insert(X_SERVICE_TIME_MS, value);
        }
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_correlation_and_service_time() {
        let id = CorrelationId::new();
        let reply = Reply::text(StatusCode::OK, "hi");
        let envelope = ResponseEnvelope::from_reply(id, reply, Duration::from_micros(1500));

        let response = envelope.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CORRELATION_ID], id.to_string().as_str());
        assert_eq!(response.headers()[X_SERVICE_TIME_MS], "1.500");
        assert_eq!(response.headers()[CONNECTION], "close");
    }

    #[test]
    fn invalid_remote_status_becomes_500() {
        let mut envelope = ResponseEnvelope::error(CorrelationId::new(), StatusCode::OK, "ok");
        envelope.status = 1000;
        assert_eq!(envelope.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
