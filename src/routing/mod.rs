//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope (method, uri, version)
//!     → matcher.rs (route, sub-route, remaining path)
//!     → plugin registry lookup
//!     → dispatcher.rs (servlet call, error → status mapping)
//!     → ResponseEnvelope
//! ```
//!
//! # Design Decisions
//! - The registry can change between requests; a request keeps the plugin
//!   snapshot it resolved
//! - Explicit errors rather than a silent default route, unless the static
//!   fallback is configured

pub mod dispatcher;
pub mod error;
pub mod matcher;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use matcher::{RoutePath, RouteRules};
