//! Broker abstraction: two durable work queues with explicit acks.

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::bridge::error::BridgeError;
use crate::bridge::memory::{MemoryAck, MemoryBroker};
use crate::bridge::nats::NatsBroker;

/// The two queues the bridge uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    Requests,
    Responses,
}

impl Queue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::Requests => "requests",
            Queue::Responses => "responses",
        }
    }
}

/// A received message. Dropping it without [`Delivery::ack`] leaves it to
/// be redelivered.
pub struct Delivery {
    pub payload: Bytes,
    acker: Acker,
}

enum Acker {
    Nats(async_nats::jetstream::Message),
    Memory(MemoryAck),
}

impl Delivery {
    pub(crate) fn nats(message: async_nats::jetstream::Message) -> Self {
        Self {
            payload: message.payload.clone(),
            acker: Acker::Nats(message),
        }
    }

    pub(crate) fn memory(payload: Bytes, ack: MemoryAck) -> Self {
        Self {
            payload,
            acker: Acker::Memory(ack),
        }
    }

    pub async fn ack(self) -> Result<(), BridgeError> {
        match self.acker {
            Acker::Nats(message) => message
                .ack()
                .await
                .map_err(|e| BridgeError::Broker(e.to_string())),
            Acker::Memory(ack) => {
                ack.ack();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

pub type DeliveryStream = BoxStream<'static, Result<Delivery, BridgeError>>;

/// A connected broker.
#[derive(Clone)]
pub enum Broker {
    Nats(NatsBroker),
    /// In-process broker for single-binary setups and tests.
    Memory(MemoryBroker),
}

impl Broker {
    pub async fn publish(&self, queue: Queue, payload: Bytes) -> Result<(), BridgeError> {
        match self {
            Broker::Nats(broker) => broker.publish(queue, payload).await,
            Broker::Memory(broker) => broker.publish(queue, payload),
        }
    }

    /// Consume `queue`, holding at most `prefetch` unacknowledged deliveries.
    pub async fn consume(&self, queue: Queue, prefetch: usize) -> Result<DeliveryStream, BridgeError> {
        match self {
            Broker::Nats(broker) => broker.consume(queue, prefetch).await,
            Broker::Memory(broker) => Ok(broker.consume(queue, prefetch)),
        }
    }
}

impl From<NatsBroker> for Broker {
    fn from(broker: NatsBroker) -> Self {
        Broker::Nats(broker)
    }
}

impl From<MemoryBroker> for Broker {
    fn from(broker: MemoryBroker) -> Self {
        Broker::Memory(broker)
    }
}
