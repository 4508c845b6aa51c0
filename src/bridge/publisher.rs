//! Server side of the bridge.
//!
//! Each submitted request registers a pending entry keyed by correlation id,
//! then goes out on the request queue. The response loop completes pending
//! entries as responses arrive. A response with no pending entry (duplicate
//! redelivery, or one that arrived after its timeout) is acked and dropped.
//!
//! If the response consumer dies the publisher closes: waiting requests and
//! every later submit fail at once instead of holding worker slots until
//! their timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::oneshot;

use crate::bridge::broker::{Broker, Delivery, Queue};
use crate::bridge::error::BridgeError;
use crate::http::request::RequestEnvelope;
use crate::http::response::ResponseEnvelope;
use crate::lifecycle::Shutdown;
use crate::net::CorrelationId;
use crate::observability::metrics;

type Pending = DashMap<CorrelationId, oneshot::Sender<ResponseEnvelope>>;

pub struct RemotePublisher {
    broker: Broker,
    pending: Pending,
    closed: AtomicBool,
    response_timeout: Duration,
    prefetch: usize,
}

/// Removes a pending entry when the submitter gives up.
struct PendingEntry<'a> {
    pending: &'a Pending,
    id: CorrelationId,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

impl RemotePublisher {
    pub fn new(broker: Broker, response_timeout: Duration, prefetch: usize) -> Self {
        Self {
            broker,
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
            response_timeout,
            prefetch,
        }
    }

    /// Publish a request and wait for its response.
    pub async fn submit(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        let id = request.correlation_id;
        let payload = serde_json::to_vec(request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };
        // A close racing the insert above may have missed this entry.
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }

        self.broker.publish(Queue::Requests, payload.into()).await?;
        tracing::debug!(correlation_id = %id, "Request published");

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => Err(BridgeError::Timeout(id, self.response_timeout)),
        }
    }

    /// Requests still waiting for a response.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fail every waiting request and refuse new ones.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let waiting = self.pending.len();
        self.pending.clear();
        tracing::error!(waiting, "Response consumer lost, bridge closed");
    }

    /// Consume the response queue until shutdown. On error the publisher is
    /// closed before returning.
    pub async fn run_responses(self: Arc<Self>, shutdown: Shutdown) -> Result<(), BridgeError> {
        let result = self.consume_responses(shutdown).await;
        if result.is_err() {
            self.close();
        }
        result
    }

    async fn consume_responses(&self, shutdown: Shutdown) -> Result<(), BridgeError> {
        let mut deliveries = self.broker.consume(Queue::Responses, self.prefetch).await?;
        let stop = shutdown.signalled();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => self.complete(delivery).await,
                    Some(Err(e)) => tracing::warn!(error = %e, "Response delivery failed"),
                    None => {
                        return Err(BridgeError::BrokerUnavailable(
                            "response stream ended".into(),
                        ))
                    }
                },
                _ = &mut stop => break,
            }
        }

        tracing::info!("Response consumer stopped");
        Ok(())
    }

    async fn complete(&self, delivery: Delivery) {
        match serde_json::from_slice::<ResponseEnvelope>(&delivery.payload) {
            Ok(response) => {
                let id = response.correlation_id;
                match self.pending.remove(&id) {
                    Some((_, waiter)) => {
                        if waiter.send(response).is_err() {
                            tracing::debug!(correlation_id = %id, "Requester went away");
                        }
                    }
                    None => {
                        tracing::debug!(
                            correlation_id = %id,
                            "Response has no pending request, dropping"
                        );
                        metrics::record_bridge_message("dropped");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable response envelope, dropping");
                metrics::record_bridge_message("dropped");
            }
        }

        if let Err(e) = delivery.ack().await {
            tracing::warn!(error = %e, "Failed to ack response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBroker;
    use crate::net::ClientId;
    use bytes::Bytes;
    use hyper::{Method, Request};
    use std::net::IpAddr;

    fn request() -> RequestEnvelope {
        let (parts, _) = Request::builder()
            .method(Method::GET)
            .uri("/v1/echo/EchoServlet")
            .body(())
            .unwrap()
            .into_parts();
        RequestEnvelope::new(
            CorrelationId::new(),
            ClientId::from(IpAddr::from([127, 0, 0, 1])),
            &parts,
            Bytes::new(),
        )
    }

    fn publisher(broker: &MemoryBroker) -> Arc<RemotePublisher> {
        Arc::new(RemotePublisher::new(
            broker.clone().into(),
            Duration::from_secs(30),
            1,
        ))
    }

    #[tokio::test]
    async fn response_completes_its_own_request() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        let shutdown = Shutdown::new();
        tokio::spawn(Arc::clone(&publisher).run_responses(shutdown.clone()));

        let request = request();
        let id = request.correlation_id;
        let waiting = {
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move { publisher.submit(&request).await })
        };

        let mut requests = broker.consume(Queue::Requests, 1);
        let delivery = requests.next().await.unwrap().unwrap();
        let received: RequestEnvelope = serde_json::from_slice(&delivery.payload).unwrap();
        let reply = ResponseEnvelope::error(received.correlation_id, hyper::StatusCode::OK, "ok");
        let payload = serde_json::to_vec(&reply).unwrap();
        broker.publish(Queue::Responses, payload.clone().into()).unwrap();
        // Redelivered duplicate is dropped.
        broker.publish(Queue::Responses, payload.into()).unwrap();

        let response = waiting.await.unwrap().unwrap();
        assert_eq!(response.correlation_id, id);
        assert_eq!(publisher.pending(), 0);
        shutdown.trigger();
    }

    #[tokio::test]
    async fn lost_response_stream_fails_requests_fast() {
        let broker = MemoryBroker::new();
        let publisher = publisher(&broker);
        let consumer = tokio::spawn(Arc::clone(&publisher).run_responses(Shutdown::new()));

        let waiting = {
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move { publisher.submit(&request()).await })
        };
        while publisher.pending() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        broker.close(Queue::Responses);
        let ended = tokio::time::timeout(Duration::from_secs(1), consumer).await.unwrap().unwrap();
        assert!(matches!(ended, Err(BridgeError::BrokerUnavailable(_))));
        assert!(publisher.is_closed());

        let waited = tokio::time::timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap();
        assert!(matches!(waited, Err(BridgeError::Closed)));

        let later = tokio::time::timeout(Duration::from_secs(1), publisher.submit(&request()))
            .await
            .unwrap();
        assert!(matches!(later, Err(BridgeError::Closed)));
        assert_eq!(publisher.pending(), 0);
    }
}
