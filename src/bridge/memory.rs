//! In-process broker.
//!
//! Each queue is a channel shared by competing consumers. Unacknowledged
//! deliveries are put back on the queue when dropped, and a consumer holds at
//! most `prefetch` of them at once. A closed queue ends every consumer
//! stream and refuses new messages.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch, Mutex, OwnedSemaphorePermit, Semaphore};

use crate::bridge::broker::{Delivery, DeliveryStream, Queue};
use crate::bridge::error::BridgeError;
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct Channel {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Bytes>>>,
    closed: Arc<watch::Sender<bool>>,
}

impl Channel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: Arc::new(watch::channel(false).0),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryBroker {
    requests: Channel,
    responses: Channel,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Channel::new(),
        }
    }

    fn channel(&self, queue: Queue) -> &Channel {
        match queue {
            Queue::Requests => &self.requests,
            Queue::Responses => &self.responses,
        }
    }

    /// Close `queue` for every clone of this broker.
    pub fn close(&self, queue: Queue) {
        self.channel(queue).closed.send_replace(true);
    }

    pub fn publish(&self, queue: Queue, payload: Bytes) -> Result<(), BridgeError> {
        let channel = self.channel(queue);
        if channel.is_closed() {
            return Err(BridgeError::BrokerUnavailable(format!("{} queue closed", queue.as_str())));
        }
        channel
            .tx
            .send(payload)
            .map_err(|_| BridgeError::BrokerUnavailable(format!("{} queue closed", queue.as_str())))?;
        metrics::record_bridge_message("published");
        Ok(())
    }

    pub fn consume(&self, queue: Queue, prefetch: usize) -> DeliveryStream {
        let channel = self.channel(queue).clone();
        let window = Arc::new(Semaphore::new(prefetch.max(1)));

        stream::unfold((channel, window), |(channel, window)| async move {
            let permit = Arc::clone(&window).acquire_owned().await.ok()?;
            let mut closed = channel.closed.subscribe();
            let payload = tokio::select! {
                payload = async { channel.rx.lock().await.recv().await } => payload?,
                _ = closed.wait_for(|closed| *closed) => return None,
            };
            let ack = MemoryAck {
                payload: Some(payload.clone()),
                requeue: channel.tx.clone(),
                _permit: permit,
            };
            Some((Ok(Delivery::memory(payload, ack)), (channel, window)))
        })
        .boxed()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Settles a memory delivery. Requeues the payload unless acknowledged.
pub struct MemoryAck {
    payload: Option<Bytes>,
    requeue: mpsc::UnboundedSender<Bytes>,
    _permit: OwnedSemaphorePermit,
}

impl MemoryAck {
    pub(crate) fn ack(mut self) {
        self.payload = None;
    }
}

impl Drop for MemoryAck {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.take() {
            tracing::debug!("Unacknowledged delivery requeued");
            let _ = self.requeue.send(payload);
        }
    }
}
