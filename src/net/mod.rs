//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (client, connection and correlation identities)
//!     → admission gate
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ClientId, Connection, ConnectionId, CorrelationId};
pub use listener::{Listener, ListenerError};
