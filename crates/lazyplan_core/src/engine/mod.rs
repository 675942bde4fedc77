//! Progress-aggregation and reordering engine.
//!
//! # Responsibility
//! - Compute derived state (progress, status, sibling order) as pure functions
//!   over a `Snapshot`.
//! - Never perform I/O; callers submit the resulting batches to a store.
//!
//! # Invariants
//! - Aggregation cascades are synchronous and complete before a batch is built.

pub mod ordering;
pub mod progress;
pub mod snapshot;
