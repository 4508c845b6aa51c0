//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! scheduled connection
//!     → server.rs (hyper HTTP/1.1, one request per connection)
//!     → request.rs (RequestEnvelope with correlation id)
//!     → executor.rs (local dispatcher or remote worker)
//!     → response.rs (ResponseEnvelope → wire response)
//! ```

pub mod executor;
pub mod request;
pub mod response;
pub mod server;

pub use executor::Executor;
pub use request::RequestEnvelope;
pub use response::{ResponseEnvelope, X_CORRELATION_ID, X_SERVICE_TIME_MS};
pub use server::{ConnectionGate, Server, ServerError};
