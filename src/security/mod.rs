//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → bans.rs (is the client banned?)
//!     → counters.rs (outstanding requests per client)
//!     → admission.rs (admit and enqueue, or drop and ban)
//! ```
//!
//! # Design Decisions
//! - Fail closed: dropped connections get no response at all
//! - Counts only move through tickets, so every exit path decrements

pub mod admission;
pub mod bans;
pub mod counters;

pub use admission::{Admission, AdmissionGate, Admitted, DropReason};
pub use bans::{BanEntry, BanList};
pub use counters::{AdmissionTicket, ClientCounters};
