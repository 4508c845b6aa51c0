//! Where a scheduled request is processed: in this process, or on a remote
//! worker through the broker.

use std::sync::Arc;

use hyper::StatusCode;

use crate::bridge::RemotePublisher;
use crate::http::request::RequestEnvelope;
use crate::http::response::ResponseEnvelope;
use crate::routing::Dispatcher;

#[derive(Clone)]
pub enum Executor {
    Local(Arc<Dispatcher>),
    Remote(Arc<RemotePublisher>),
}

impl Executor {
    /// Process a request. Never fails: infrastructure errors become 500s.
    pub async fn execute(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let id = request.correlation_id;
        match self {
            Executor::Local(dispatcher) => {
                let dispatcher = Arc::clone(dispatcher);
                match tokio::task::spawn_blocking(move || dispatcher.dispatch(&request)).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(correlation_id = %id, error = %e, "Dispatch task failed");
                        ResponseEnvelope::error(id, StatusCode::INTERNAL_SERVER_ERROR, "dispatch failed")
                    }
                }
            }
            Executor::Remote(publisher) => match publisher.submit(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(correlation_id = %id, error = %e, "Remote dispatch failed");
                    ResponseEnvelope::error(
                        id,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "remote worker unavailable",
                    )
                }
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Executor::Remote(_))
    }
}
