//! Task domain model.
//!
//! # Responsibility
//! - Define the actionable record shared by Projects and Sub-tasks.
//! - Derive the hierarchy level from `parent_task_id`.
//!
//! # Invariants
//! - `parent_task_id == None` marks a Project; `Some(_)` marks a Sub-task.
//! - `progress_percent` stays within `0..=100` and is owned by the aggregator.
//! - `progress_log` is append-only, newest entry last.

use super::concern::ConcernId;
use super::entity::EntityKind;
use super::log_entry::{now_epoch_ms, LogEntry};
use super::validation::ModelValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

const CREATED_LOG_TEXT: &str = "Task created.";

/// Board column a task belongs to.
///
/// Conceptually meaningful for Projects only; Sub-tasks inherit the value of
/// their Project at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Project,
    Now,
    Todo,
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    /// Only ever set by an explicit status change, never by aggregation.
    Completed,
}

/// Position of a task in the two-level hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLevel {
    Project,
    SubTask,
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// `None` for Projects, the owning Project id for Sub-tasks.
    pub parent_task_id: Option<TaskId>,
    /// Back-reference to the concern this task was derived from. Not ownership.
    pub related_concern_id: Option<ConcernId>,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub progress_log: Vec<LogEntry>,
    /// Dense zero-based position among siblings sharing `parent_task_id`.
    pub order: i64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Task {
    /// Creates a top-level Project with a creation log entry.
    pub fn new_project(
        title: impl Into<String>,
        description: impl Into<String>,
        category: TaskCategory,
        order: i64,
    ) -> Self {
        Self::build(None, title.into(), description.into(), category, order)
    }

    /// Creates a Sub-task under `project`, inheriting its category.
    pub fn new_sub_task(
        project: &Task,
        title: impl Into<String>,
        description: impl Into<String>,
        order: i64,
    ) -> Self {
        Self::build(
            Some(project.id),
            title.into(),
            description.into(),
            project.category,
            order,
        )
    }

    fn build(
        parent_task_id: Option<TaskId>,
        title: String,
        description: String,
        category: TaskCategory,
        order: i64,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            parent_task_id,
            related_concern_id: None,
            title,
            description,
            category,
            status: TaskStatus::Pending,
            progress_percent: 0,
            progress_log: vec![LogEntry::new(now, CREATED_LOG_TEXT)],
            order,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn level(&self) -> TaskLevel {
        match self.parent_task_id {
            None => TaskLevel::Project,
            Some(_) => TaskLevel::SubTask,
        }
    }

    pub fn is_project(&self) -> bool {
        self.level() == TaskLevel::Project
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Validates record-level invariants.
    ///
    /// Hierarchy depth is checked by services against the full snapshot, not here.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() {
            return Err(ModelValidationError::NilId(EntityKind::Task));
        }
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::BlankTitle(EntityKind::Task));
        }
        if self.progress_percent > 100 {
            return Err(ModelValidationError::ProgressOutOfRange(
                self.progress_percent,
            ));
        }
        if self.order < 0 {
            return Err(ModelValidationError::NegativeOrder(self.order));
        }
        if self.parent_task_id == Some(self.id) {
            return Err(ModelValidationError::SelfParent(self.id));
        }
        Ok(())
    }
}
