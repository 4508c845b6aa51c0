//! Resilience subsystem.
//!
//! Retry with exponential backoff for calls to external services (the
//! message broker). Every attempt is logged; the last error is returned.

pub mod backoff;

pub use backoff::{calculate_backoff, RetryPolicy};
