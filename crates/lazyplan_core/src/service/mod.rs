//! Core use-case services.
//!
//! # Responsibility
//! - Turn user-level operations into one planned mutation batch each.
//! - Run progress recomputation inside the same batch as the triggering write.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - Every operation loads one snapshot, plans against a working copy of it,
//!   and submits at most one batch.
//! - Nothing is submitted for a no-op.

pub mod concern_service;
pub mod error;
pub mod task_service;

use crate::engine::progress::plan_recompute;
use crate::engine::snapshot::Snapshot;
use crate::model::entity::{EntityKind, EntityRef};
use crate::model::task::TaskId;
use crate::repo::mutation::{Mutation, MutationBatch};
use crate::repo::store::EntityStore;
use error::{InvariantViolation, ServiceError};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Result of a mutating operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One batch with `writes` mutations was applied.
    Committed { writes: usize },
    /// The request changed nothing; no batch was submitted.
    Unchanged,
    /// Target was absent from the snapshot; recovered as a no-op.
    MissingTarget(EntityRef),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn writes(&self) -> usize {
        match self {
            Self::Committed { writes } => *writes,
            Self::Unchanged | Self::MissingTarget(_) => 0,
        }
    }
}

/// Working copy plus the batch accumulated against it.
pub(crate) struct Plan {
    working: Snapshot,
    batch: MutationBatch,
}

impl Plan {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self {
            working: snapshot,
            batch: MutationBatch::new(),
        }
    }

    /// Applies `mutations` to the working copy and queues them.
    pub(crate) fn push(
        &mut self,
        mutations: impl IntoIterator<Item = Mutation>,
    ) -> Result<(), ServiceError> {
        let batch = MutationBatch::from(mutations.into_iter().collect::<Vec<_>>());
        self.working.apply(&batch)?;
        self.batch.extend(batch);
        Ok(())
    }

    /// Recomputes `task_id` (and its Project) against the working copy.
    ///
    /// Unknown ids are skipped.
    pub(crate) fn recompute(&mut self, task_id: TaskId) -> Result<(), ServiceError> {
        let Some(progress) = plan_recompute(&self.working, task_id) else {
            return Ok(());
        };
        let batch = progress.into_batch();
        self.working.apply(&batch)?;
        self.batch.extend(batch);
        Ok(())
    }

    pub(crate) fn into_batch(self) -> MutationBatch {
        self.batch
    }
}

/// Submits `batch` as one atomic write, or reports `Unchanged` when empty.
pub(crate) fn submit<S: EntityStore>(
    store: &S,
    operation: &'static str,
    batch: MutationBatch,
) -> Result<Outcome, ServiceError> {
    if batch.is_empty() {
        debug!("event={operation} module=service status=skip reason=noop");
        return Ok(Outcome::Unchanged);
    }

    let started_at = Instant::now();
    let writes = batch.len();
    match store.apply_batch(&batch) {
        Ok(()) => {
            info!(
                "event={operation} module=service status=ok writes={writes} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(Outcome::Committed { writes })
        }
        Err(err) => {
            error!(
                "event={operation} module=service status=error writes={writes} duration_ms={} error_code=batch_rejected error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err.into())
        }
    }
}

/// Logs and returns the no-op outcome for an absent target.
pub(crate) fn missing_target(operation: &'static str, target: EntityRef) -> Outcome {
    warn!(
        "event={operation} module=service status=skip reason=missing_target kind={} id={}",
        target.kind, target.id
    );
    Outcome::MissingTarget(target)
}

/// Trims and collapses inner whitespace runs into single spaces.
pub(crate) fn normalize_title(kind: EntityKind, value: &str) -> Result<String, InvariantViolation> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        return Err(InvariantViolation::BlankTitle(kind));
    }
    Ok(collapsed.into_owned())
}

/// Trims free text, keeping inner line breaks.
pub(crate) fn normalize_text(field: &'static str, value: &str) -> Result<String, InvariantViolation> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InvariantViolation::BlankText { field });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_text, normalize_title, Outcome};
    use crate::model::entity::{EntityKind, EntityRef};
    use crate::service::error::InvariantViolation;
    use uuid::Uuid;

    #[test]
    fn normalize_title_collapses_whitespace() {
        assert_eq!(
            normalize_title(EntityKind::Task, "  Ship \t the\n\nrelease ").unwrap(),
            "Ship the release"
        );
        assert_eq!(
            normalize_title(EntityKind::Step, " \n ").unwrap_err(),
            InvariantViolation::BlankTitle(EntityKind::Step)
        );
    }

    #[test]
    fn normalize_text_keeps_inner_layout() {
        assert_eq!(normalize_text("content", " a\n b ").unwrap(), "a\n b");
        assert_eq!(
            normalize_text("analysis_log", "   ").unwrap_err(),
            InvariantViolation::BlankText {
                field: "analysis_log"
            }
        );
    }

    #[test]
    fn only_committed_outcomes_count_writes() {
        assert_eq!(Outcome::Committed { writes: 3 }.writes(), 3);
        assert_eq!(Outcome::Unchanged.writes(), 0);
        let missing = Outcome::MissingTarget(EntityRef::task(Uuid::new_v4()));
        assert!(!missing.is_committed());
        assert_eq!(missing.writes(), 0);
    }
}
