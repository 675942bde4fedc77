//! Step domain model.
//!
//! # Invariants
//! - `parent_task_id` references a Sub-task, never a Project.
//! - `order` is dense within the owning task's steps once a reorder settles.

use super::entity::EntityKind;
use super::task::TaskId;
use super::validation::ModelValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable step identifier.
pub type StepId = Uuid;

/// Step completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
}

impl StepStatus {
    /// Returns the opposite state, as a checkbox toggle would.
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

/// Atomic unit of work under a Sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub parent_task_id: TaskId,
    pub title: String,
    pub status: StepStatus,
    pub order: i64,
}

impl Step {
    pub fn new(parent_task_id: TaskId, title: impl Into<String>, order: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_task_id,
            title: title.into(),
            status: StepStatus::Pending,
            order,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() || self.parent_task_id.is_nil() {
            return Err(ModelValidationError::NilId(EntityKind::Step));
        }
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::BlankTitle(EntityKind::Step));
        }
        if self.order < 0 {
            return Err(ModelValidationError::NegativeOrder(self.order));
        }
        Ok(())
    }
}
