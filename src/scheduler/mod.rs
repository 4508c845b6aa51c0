//! Scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! admitted connection
//!     → fair_queue.rs (pending, round-robin across clients)
//!     → pool.rs (wait for a worker slot)
//!     → ActiveRequestLease handed to the dispatcher
//! ```
//!
//! # Design Decisions
//! - The scheduler loop acquires a slot before dequeuing, so the entry is
//!   chosen at the moment it can actually run
//! - No polling: `Notify` wakes the queue, `Semaphore` wakes the pool

pub mod fair_queue;
pub mod pool;

pub use fair_queue::{FairQueue, Scheduled};
pub use pool::{ActiveRequestLease, WorkerPool, WorkerSlot};
