//! Core domain logic for LazyPlan.
//! This crate is the single source of truth for hierarchy, progress and
//! ordering invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use engine::ordering::{IndexOutOfBounds, OrderAssignment, SiblingGroup};
pub use engine::progress::{plan_recompute, ProgressChange, ProgressPlan, StepTally};
pub use engine::snapshot::Snapshot;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::concern::{Concern, ConcernId, ConcernStatus};
pub use model::entity::{EntityKind, EntityRef, Record};
pub use model::log_entry::LogEntry;
pub use model::memo::{Memo, MemoId};
pub use model::step::{Step, StepId, StepStatus};
pub use model::task::{Task, TaskCategory, TaskId, TaskLevel, TaskStatus};
pub use model::validation::ModelValidationError;
pub use repo::mutation::{FieldUpdate, Mutation, MutationBatch, MutationError, MutationOp};
pub use repo::store::{EntityStore, SqliteEntityStore, StoreError, StoreResult};
pub use service::concern_service::{ConcernEdit, ConcernService};
pub use service::error::{ErrorKind, InvariantViolation, ServiceError};
pub use service::task_service::{Board, ReorderRequest, TaskEdit, TaskService};
pub use service::Outcome;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
