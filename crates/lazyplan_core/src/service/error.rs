//! Service-level error taxonomy.
//!
//! # Invariants
//! - Every public operation failure maps to exactly one `ErrorKind`.
//! - Invariant violations are raised before anything is submitted.
//! - Persistence failures leave stored state untouched and are retryable.

use crate::engine::ordering::{IndexOutOfBounds, SiblingGroup};
use crate::model::concern::ConcernId;
use crate::model::entity::{EntityKind, EntityRef};
use crate::model::task::TaskId;
use crate::repo::mutation::MutationError;
use crate::repo::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation referenced an id missing from the current snapshot.
    Reference,
    /// Request rejected before mutation; nothing was written.
    InvariantViolation,
    /// Snapshot load or batch submission failed.
    Persistence,
}

/// Request that would break a structural rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Reorder source and target sibling groups differ.
    CrossGroupMove {
        source: SiblingGroup,
        target: SiblingGroup,
    },
    /// Reorder index outside the sibling group.
    IndexOutOfBounds(IndexOutOfBounds),
    /// Sub-tasks may only be created under a Project.
    ParentMustBeProject(TaskId),
    /// Steps may only be created under a Sub-task.
    StepParentMustBeSubTask(TaskId),
    /// Title is empty after normalization.
    BlankTitle(EntityKind),
    /// Free text field is empty after trimming.
    BlankText { field: &'static str },
    /// Resolved concerns cannot derive new tasks.
    ConcernAlreadyResolved(ConcernId),
    /// Planned batch failed local validation.
    InvalidMutation(MutationError),
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CrossGroupMove { source, target } => {
                write!(f, "cannot move from sibling group {source} to {target}")
            }
            Self::IndexOutOfBounds(err) => write!(f, "{err}"),
            Self::ParentMustBeProject(id) => {
                write!(f, "sub-task parent must be a project: {id}")
            }
            Self::StepParentMustBeSubTask(id) => {
                write!(f, "step parent must be a sub-task: {id}")
            }
            Self::BlankTitle(kind) => write!(f, "{kind} title must not be blank"),
            Self::BlankText { field } => write!(f, "`{field}` must not be blank"),
            Self::ConcernAlreadyResolved(id) => write!(f, "concern already resolved: {id}"),
            Self::InvalidMutation(err) => write!(f, "{err}"),
        }
    }
}

/// Errors from planner service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Referenced record does not exist and the operation cannot no-op.
    UnknownReference(EntityRef),
    /// Request rejected before mutation.
    Invariant(InvariantViolation),
    /// Store failure; the whole logical operation may be retried.
    Persistence(StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownReference(_) => ErrorKind::Reference,
            Self::Invariant(_) => ErrorKind::InvariantViolation,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Returns whether re-running the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownReference(target) => write!(f, "record not found: {target}"),
            Self::Invariant(violation) => write!(f, "{violation}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::Invariant(InvariantViolation::InvalidMutation(err)) => Some(err),
            Self::Invariant(InvariantViolation::IndexOutOfBounds(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value)
    }
}

impl From<InvariantViolation> for ServiceError {
    fn from(value: InvariantViolation) -> Self {
        Self::Invariant(value)
    }
}

impl From<IndexOutOfBounds> for ServiceError {
    fn from(value: IndexOutOfBounds) -> Self {
        Self::Invariant(InvariantViolation::IndexOutOfBounds(value))
    }
}

impl From<MutationError> for ServiceError {
    fn from(value: MutationError) -> Self {
        Self::Invariant(InvariantViolation::InvalidMutation(value))
    }
}
