//! Memo domain model.
//!
//! Memos are descriptive only and never participate in aggregation.

use super::entity::EntityKind;
use super::log_entry::now_epoch_ms;
use super::step::StepId;
use super::validation::ModelValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable memo identifier.
pub type MemoId = Uuid;

/// Freeform note attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub id: MemoId,
    pub parent_step_id: StepId,
    pub content: String,
    /// Unix epoch milliseconds of the last write.
    pub timestamp_ms: i64,
}

impl Memo {
    pub fn new(parent_step_id: StepId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_step_id,
            content: content.into(),
            timestamp_ms: now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() || self.parent_step_id.is_nil() {
            return Err(ModelValidationError::NilId(EntityKind::Memo));
        }
        Ok(())
    }
}
