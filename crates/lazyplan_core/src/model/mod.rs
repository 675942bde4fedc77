//! Domain model for the task/concern planner.
//!
//! # Responsibility
//! - Define canonical records consumed by the progress and ordering engine.
//! - Keep entity discrimination explicit through tagged variants.
//!
//! # Invariants
//! - Every record is identified by a stable, non-nil UUID.
//! - The task hierarchy is exactly two levels deep: Project -> Sub-task.
//! - Steps hang off Sub-tasks; Memos hang off Steps.

pub mod concern;
pub mod entity;
pub mod log_entry;
pub mod memo;
pub mod step;
pub mod task;
pub mod validation;
