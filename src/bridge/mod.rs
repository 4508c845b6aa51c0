//! Remote worker bridge.
//!
//! # Data Flow
//! ```text
//! server:  RequestEnvelope → publisher.rs → request queue
//! worker:  request queue → worker.rs → Dispatcher → response queue
//! server:  response queue → publisher.rs → waiting connection (by correlation id)
//! ```
//!
//! # Design Decisions
//! - Durable queues, explicit acks after the work is done (at-least-once)
//! - Duplicate responses are dropped at the publisher; handlers may still see
//!   a redelivered request twice

pub mod broker;
pub mod error;
pub mod memory;
pub mod nats;
pub mod publisher;
pub mod worker;

pub use broker::{Broker, Delivery, DeliveryStream, Queue};
pub use error::BridgeError;
pub use memory::MemoryBroker;
pub use nats::NatsBroker;
pub use publisher::RemotePublisher;
pub use worker::RemoteWorker;
