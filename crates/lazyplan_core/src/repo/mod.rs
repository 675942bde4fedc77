//! Persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Describe intended writes as plain mutation batches.
//! - Define the snapshot/batch store contract the services depend on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Store writes enforce record `validate()` before persistence.
//! - A batch is applied completely or not at all.

pub mod mutation;
pub mod store;
