//! NATS JetStream broker.
//!
//! Requests and responses each live on a durable work-queue stream. Consumers
//! are durable pull consumers with explicit acks; `max_ack_pending` is the
//! prefetch window.

use async_nats::jetstream::{self, consumer, stream};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::bridge::broker::{Delivery, DeliveryStream, Queue};
use crate::bridge::error::BridgeError;
use crate::config::BrokerConfig;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

#[derive(Clone)]
pub struct NatsBroker {
    jetstream: jetstream::Context,
    config: BrokerConfig,
}

impl NatsBroker {
    /// Connect, retrying with backoff, and make sure both streams exist.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BridgeError> {
        let policy = RetryPolicy {
            attempts: config.connect_attempts,
            base_ms: 200,
            max_ms: 5_000,
        };
        let client = policy
            .run("nats connect", || async_nats::connect(config.url.as_str()))
            .await
            .map_err(|e| {
                BridgeError::BrokerUnavailable(format!(
                    "cannot reach {} after {} attempts: {e}",
                    config.url, config.connect_attempts
                ))
            })?;
        tracing::info!(url = %config.url, "Connected to NATS");

        let broker = Self {
            jetstream: jetstream::new(client),
            config: config.clone(),
        };
        broker.ensure_stream(Queue::Requests).await?;
        broker.ensure_stream(Queue::Responses).await?;
        Ok(broker)
    }

    fn subject(&self, queue: Queue) -> &str {
        match queue {
            Queue::Requests => &self.config.request_subject,
            Queue::Responses => &self.config.response_subject,
        }
    }

    fn stream_name(&self, queue: Queue) -> &str {
        match queue {
            Queue::Requests => &self.config.request_stream,
            Queue::Responses => &self.config.response_stream,
        }
    }

    fn consumer_name(&self, queue: Queue) -> &str {
        match queue {
            Queue::Requests => &self.config.worker_consumer,
            Queue::Responses => &self.config.bridge_consumer,
        }
    }

    async fn ensure_stream(&self, queue: Queue) -> Result<(), BridgeError> {
        let name = self.stream_name(queue).to_string();
        self.jetstream
            .get_or_create_stream(stream::Config {
                name: name.clone(),
                subjects: vec![self.subject(queue).to_string()],
                retention: stream::RetentionPolicy::WorkQueue,
                storage: stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| BridgeError::BrokerUnavailable(format!("stream {name}: {e}")))?;

        tracing::info!(stream = %name, subject = self.subject(queue), "Stream ready");
        Ok(())
    }

    pub async fn publish(&self, queue: Queue, payload: Bytes) -> Result<(), BridgeError> {
        self.jetstream
            .publish(self.subject(queue).to_string(), payload)
            .await
            .map_err(|e| BridgeError::Broker(e.to_string()))?
            .await
            .map_err(|e| BridgeError::Broker(e.to_string()))?;
        metrics::record_bridge_message("published");
        Ok(())
    }

    pub async fn consume(&self, queue: Queue, prefetch: usize) -> Result<DeliveryStream, BridgeError> {
        let stream_name = self.stream_name(queue);
        let durable = self.consumer_name(queue).to_string();

        let stream = self
            .jetstream
            .get_stream(stream_name)
            .await
            .map_err(|e| BridgeError::BrokerUnavailable(format!("stream {stream_name}: {e}")))?;

        let consumer: consumer::PullConsumer = stream
            .get_or_create_consumer(
                &durable,
                consumer::pull::Config {
                    durable_name: Some(durable.clone()),
                    ack_policy: consumer::AckPolicy::Explicit,
                    max_ack_pending: prefetch.max(1) as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BridgeError::BrokerUnavailable(format!("consumer {durable}: {e}")))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| BridgeError::BrokerUnavailable(format!("consumer {durable}: {e}")))?;

        tracing::info!(
            stream = %stream_name,
            consumer = %durable,
            prefetch,
            "Consuming queue"
        );

        Ok(messages
            .map(|message| match message {
                Ok(message) => {
                    metrics::record_bridge_message("received");
                    Ok(Delivery::nats(message))
                }
                Err(e) => Err(BridgeError::Broker(e.to_string())),
            })
            .boxed())
    }
}
