//! Explicit entity tags.
//!
//! # Responsibility
//! - Discriminate records by an explicit kind instead of probing their shape.
//! - Provide a uniform reference (`EntityRef`) for mutations and errors.
//!
//! # Invariants
//! - Every branch on entity kind is an exhaustive `match`.

use super::concern::Concern;
use super::memo::Memo;
use super::step::Step;
use super::task::Task;
use super::validation::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Discriminant for every persisted record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Step,
    Memo,
    Concern,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Step => "step",
            Self::Memo => "memo",
            Self::Concern => "concern",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-qualified reference to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn task(id: Uuid) -> Self {
        Self::new(EntityKind::Task, id)
    }

    pub fn step(id: Uuid) -> Self {
        Self::new(EntityKind::Step, id)
    }

    pub fn memo(id: Uuid) -> Self {
        Self::new(EntityKind::Memo, id)
    }

    pub fn concern(id: Uuid) -> Self {
        Self::new(EntityKind::Concern, id)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Any persisted record, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Task(Task),
    Step(Step),
    Memo(Memo),
    Concern(Concern),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Task(_) => EntityKind::Task,
            Self::Step(_) => EntityKind::Step,
            Self::Memo(_) => EntityKind::Memo,
            Self::Concern(_) => EntityKind::Concern,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Task(task) => task.id,
            Self::Step(step) => step.id,
            Self::Memo(memo) => memo.id,
            Self::Concern(concern) => concern.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        match self {
            Self::Task(task) => task.validate(),
            Self::Step(step) => step.validate(),
            Self::Memo(memo) => memo.validate(),
            Self::Concern(concern) => concern.validate(),
        }
    }
}
