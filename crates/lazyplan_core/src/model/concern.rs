//! Concern domain model.
//!
//! # Responsibility
//! - Track open-ended analytical items and their analysis history.
//!
//! # Invariants
//! - `analysis_log` is append-only, newest entry last.
//! - Deleting a concern never deletes tasks derived from it.

use super::entity::EntityKind;
use super::log_entry::{now_epoch_ms, LogEntry};
use super::validation::ModelValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable concern identifier.
pub type ConcernId = Uuid;

const CREATED_LOG_TEXT: &str = "Concern created.";

/// Concern lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernStatus {
    Analyzing,
    /// At least one task has been derived as a resolution.
    SolutionDerived,
    Resolved,
}

/// Canonical concern record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concern {
    pub id: ConcernId,
    pub title: String,
    pub description: String,
    /// Proposed resolution; becomes the description of a derived task.
    pub resolution_action: String,
    pub status: ConcernStatus,
    pub analysis_log: Vec<LogEntry>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Concern {
    /// Creates a concern in `Analyzing` state with a creation log entry.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        resolution_action: impl Into<String>,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            resolution_action: resolution_action.into(),
            status: ConcernStatus::Analyzing,
            analysis_log: vec![LogEntry::new(now, CREATED_LOG_TEXT)],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ConcernStatus::Resolved
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.id.is_nil() {
            return Err(ModelValidationError::NilId(EntityKind::Concern));
        }
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::BlankTitle(EntityKind::Concern));
        }
        Ok(())
    }
}
