//! Record-level validation errors.

use super::entity::EntityKind;
use super::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failures detected on a single record before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Nil UUID is reserved and never identifies a record.
    NilId(EntityKind),
    /// Title is empty after trimming.
    BlankTitle(EntityKind),
    /// `progress_percent` must stay within `0..=100`.
    ProgressOutOfRange(u8),
    /// Sibling order keys are zero-based.
    NegativeOrder(i64),
    /// A task cannot be its own parent.
    SelfParent(TaskId),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId(kind) => write!(f, "{kind} id must not be nil"),
            Self::BlankTitle(kind) => write!(f, "{kind} title must not be blank"),
            Self::ProgressOutOfRange(value) => {
                write!(f, "progress_percent ({value}) must be within 0..=100")
            }
            Self::NegativeOrder(value) => write!(f, "order ({value}) must be >= 0"),
            Self::SelfParent(id) => write!(f, "task {id} cannot be its own parent"),
        }
    }
}

impl Error for ModelValidationError {}
