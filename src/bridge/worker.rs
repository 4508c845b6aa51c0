//! Worker side of the bridge.
//!
//! Consumes the request queue with a bounded prefetch window, dispatches each
//! request through the local registry, publishes the response, then acks.
//! A request whose response could not be published stays unacked and is
//! redelivered.

use std::sync::Arc;

use futures_util::StreamExt;
use hyper::StatusCode;

use crate::bridge::broker::{Broker, Delivery, Queue};
use crate::bridge::error::BridgeError;
use crate::http::request::RequestEnvelope;
use crate::http::response::ResponseEnvelope;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::Dispatcher;
use crate::scheduler::WorkerPool;

pub struct RemoteWorker {
    broker: Broker,
    dispatcher: Arc<Dispatcher>,
    pool: WorkerPool,
    prefetch: usize,
}

impl RemoteWorker {
    pub fn new(broker: Broker, dispatcher: Arc<Dispatcher>, capacity: usize, prefetch: usize) -> Self {
        Self {
            broker,
            dispatcher,
            pool: WorkerPool::new(capacity),
            prefetch,
        }
    }

    /// Process requests until shutdown. Returns an error when the broker
    /// becomes unavailable.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), BridgeError> {
        let mut deliveries = self.broker.consume(Queue::Requests, self.prefetch).await?;
        let stop = shutdown.signalled();
        tokio::pin!(stop);

        tracing::info!(
            capacity = self.pool.capacity(),
            prefetch = self.prefetch,
            "Remote worker started"
        );

        loop {
            let delivery = tokio::select! {
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Request delivery failed");
                        continue;
                    }
                    None => {
                        return Err(BridgeError::BrokerUnavailable(
                            "request stream ended".into(),
                        ))
                    }
                },
                _ = &mut stop => break,
            };

            let slot = tokio::select! {
                slot = self.pool.acquire() => slot.map_err(|_| BridgeError::Closed)?,
                _ = &mut stop => break,
            };

            let broker = self.broker.clone();
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                let _slot = slot;
                if let Err(e) = handle(broker, dispatcher, delivery).await {
                    tracing::error!(error = %e, "Request left unacknowledged");
                }
            });
        }

        tracing::info!("Remote worker stopped");
        Ok(())
    }
}

async fn handle(broker: Broker, dispatcher: Arc<Dispatcher>, delivery: Delivery) -> Result<(), BridgeError> {
    let request: RequestEnvelope = match serde_json::from_slice(&delivery.payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable request envelope, dropping");
            metrics::record_bridge_message("dropped");
            return delivery.ack().await;
        }
    };
    let id = request.correlation_id;

    let response = tokio::task::spawn_blocking(move || dispatcher.dispatch(&request))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(correlation_id = %id, error = %e, "Dispatch task failed");
            ResponseEnvelope::error(id, StatusCode::INTERNAL_SERVER_ERROR, "dispatch failed")
        });

    tracing::debug!(correlation_id = %id, status = response.status, "Publishing response");
    let payload = serde_json::to_vec(&response)?;
    broker.publish(Queue::Responses, payload.into()).await?;
    delivery.ack().await
}
