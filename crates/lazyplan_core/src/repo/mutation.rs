//! Mutation batches submitted to an entity store.
//!
//! # Responsibility
//! - Describe every write the core intends as plain data.
//! - Reject malformed batches before any store sees them.
//!
//! # Invariants
//! - A batch is applied all-or-nothing, in insertion order.
//! - Each `FieldUpdate` is valid for a fixed set of entity kinds.
//! - Child deletes precede parent deletes within one batch.

use crate::model::concern::{ConcernId, ConcernStatus};
use crate::model::entity::{EntityKind, EntityRef, Record};
use crate::model::log_entry::LogEntry;
use crate::model::step::StepStatus;
use crate::model::task::{TaskCategory, TaskStatus};
use crate::model::validation::ModelValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Typed single-field write.
///
/// The kinds each variant may target are defined by [`FieldUpdate::applies_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Title(String),
    Description(String),
    Category(TaskCategory),
    TaskStatus(TaskStatus),
    ProgressPercent(u8),
    Order(i64),
    RelatedConcern(Option<ConcernId>),
    AppendProgressLog(LogEntry),
    StepStatus(StepStatus),
    Content(String),
    Timestamp(i64),
    ResolutionAction(String),
    ConcernStatus(ConcernStatus),
    AppendAnalysisLog(LogEntry),
}

impl FieldUpdate {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Description(_) => "description",
            Self::Category(_) => "category",
            Self::TaskStatus(_) | Self::StepStatus(_) | Self::ConcernStatus(_) => "status",
            Self::ProgressPercent(_) => "progress_percent",
            Self::Order(_) => "order",
            Self::RelatedConcern(_) => "related_concern_id",
            Self::AppendProgressLog(_) => "progress_log",
            Self::Content(_) => "content",
            Self::Timestamp(_) => "timestamp_ms",
            Self::ResolutionAction(_) => "resolution_action",
            Self::AppendAnalysisLog(_) => "analysis_log",
        }
    }

    pub fn applies_to(&self, kind: EntityKind) -> bool {
        match self {
            Self::Title(_) => matches!(
                kind,
                EntityKind::Task | EntityKind::Step | EntityKind::Concern
            ),
            Self::Description(_) => matches!(kind, EntityKind::Task | EntityKind::Concern),
            Self::Order(_) => matches!(kind, EntityKind::Task | EntityKind::Step),
            Self::Category(_)
            | Self::TaskStatus(_)
            | Self::ProgressPercent(_)
            | Self::RelatedConcern(_)
            | Self::AppendProgressLog(_) => kind == EntityKind::Task,
            Self::StepStatus(_) => kind == EntityKind::Step,
            Self::Content(_) | Self::Timestamp(_) => kind == EntityKind::Memo,
            Self::ResolutionAction(_) | Self::ConcernStatus(_) | Self::AppendAnalysisLog(_) => {
                kind == EntityKind::Concern
            }
        }
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        match self {
            Self::ProgressPercent(value) if *value > 100 => {
                Err(ModelValidationError::ProgressOutOfRange(*value))
            }
            Self::Order(value) if *value < 0 => Err(ModelValidationError::NegativeOrder(*value)),
            _ => Ok(()),
        }
    }
}

/// Operation applied to one target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOp {
    Insert(Record),
    Update(Vec<FieldUpdate>),
    Delete,
}

/// One write against one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub target: EntityRef,
    pub op: MutationOp,
}

impl Mutation {
    pub fn insert(record: Record) -> Self {
        Self {
            target: record.entity_ref(),
            op: MutationOp::Insert(record),
        }
    }

    pub fn update(target: EntityRef, updates: Vec<FieldUpdate>) -> Self {
        Self {
            target,
            op: MutationOp::Update(updates),
        }
    }

    pub fn delete(target: EntityRef) -> Self {
        Self {
            target,
            op: MutationOp::Delete,
        }
    }

    /// Checks shape-level consistency without looking at stored state.
    pub fn validate(&self) -> Result<(), MutationError> {
        match &self.op {
            MutationOp::Insert(record) => {
                if record.entity_ref() != self.target {
                    return Err(MutationError::RecordMismatch(self.target));
                }
                record
                    .validate()
                    .map_err(|source| MutationError::InvalidRecord {
                        target: self.target,
                        source,
                    })
            }
            MutationOp::Update(updates) => {
                if updates.is_empty() {
                    return Err(MutationError::EmptyUpdate(self.target));
                }
                for update in updates {
                    if !update.applies_to(self.target.kind) {
                        return Err(MutationError::FieldNotApplicable {
                            field: update.field_name(),
                            kind: self.target.kind,
                        });
                    }
                    update
                        .validate()
                        .map_err(|source| MutationError::InvalidRecord {
                            target: self.target,
                            source,
                        })?;
                }
                Ok(())
            }
            MutationOp::Delete => Ok(()),
        }
    }
}

/// Ordered list of mutations forming one logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn extend(&mut self, other: MutationBatch) {
        self.mutations.extend(other.mutations);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn validate(&self) -> Result<(), MutationError> {
        self.mutations.iter().try_for_each(Mutation::validate)
    }
}

impl From<Vec<Mutation>> for MutationBatch {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }
}

impl<'a> IntoIterator for &'a MutationBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}

/// Batch rejected before or during application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Insert payload does not match the mutation target.
    RecordMismatch(EntityRef),
    /// Update without any field writes.
    EmptyUpdate(EntityRef),
    /// Field write is not defined for the target kind.
    FieldNotApplicable {
        field: &'static str,
        kind: EntityKind,
    },
    /// Inserted record or written value fails model validation.
    InvalidRecord {
        target: EntityRef,
        source: ModelValidationError,
    },
    /// Update/delete target is absent from the state being written.
    MissingTarget(EntityRef),
    /// Insert target id already exists.
    DuplicateTarget(EntityRef),
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordMismatch(target) => {
                write!(f, "insert payload does not match target {target}")
            }
            Self::EmptyUpdate(target) => write!(f, "update for {target} has no fields"),
            Self::FieldNotApplicable { field, kind } => {
                write!(f, "field `{field}` is not defined for {kind}")
            }
            Self::InvalidRecord { target, source } => write!(f, "invalid {target}: {source}"),
            Self::MissingTarget(target) => write!(f, "mutation target not found: {target}"),
            Self::DuplicateTarget(target) => write!(f, "mutation target already exists: {target}"),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord { source, .. } => Some(source),
            _ => None,
        }
    }
}
