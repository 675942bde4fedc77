//! Sibling sequence ordering.
//!
//! # Responsibility
//! - Define the display order of a sibling group.
//! - Compute dense order reassignment for drag-style moves.
//!
//! # Invariants
//! - Display order: non-completed before completed, then `order ASC`, then `id ASC`.
//! - Reorder indices address the display order, not raw storage order.
//! - After a reorder the group's order values are exactly `0..n`.
//! - Insertion appends one past the largest `order` in the group, so gaps left by
//!   a deletion are never reused; the next reorder normalizes them.

use crate::model::entity::EntityKind;
use crate::model::step::Step;
use crate::model::task::{Task, TaskId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Record that occupies a slot in a sibling sequence.
pub trait Sequenced {
    fn sequence_id(&self) -> Uuid;
    fn order(&self) -> i64;
    fn is_completed(&self) -> bool;
}

impl Sequenced for Task {
    fn sequence_id(&self) -> Uuid {
        self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn is_completed(&self) -> bool {
        Task::is_completed(self)
    }
}

impl Sequenced for Step {
    fn sequence_id(&self) -> Uuid {
        self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn is_completed(&self) -> bool {
        Step::is_completed(self)
    }
}

/// Identifies one sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiblingGroup {
    /// Tasks sharing `parent` (`None` = top-level Projects).
    Tasks { parent: Option<TaskId> },
    /// Steps owned by one Sub-task.
    Steps { task: TaskId },
}

impl SiblingGroup {
    pub fn member_kind(&self) -> EntityKind {
        match self {
            Self::Tasks { .. } => EntityKind::Task,
            Self::Steps { .. } => EntityKind::Step,
        }
    }
}

impl Display for SiblingGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tasks { parent: None } => write!(f, "tasks@root"),
            Self::Tasks { parent: Some(id) } => write!(f, "tasks@{id}"),
            Self::Steps { task } => write!(f, "steps@{task}"),
        }
    }
}

/// New order value for one sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAssignment {
    pub id: Uuid,
    pub order: i64,
}

/// Reorder indices outside the sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutOfBounds {
    pub index: usize,
    pub len: usize,
}

impl Display for IndexOutOfBounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index {} is out of bounds for sibling group of {}",
            self.index, self.len
        )
    }
}

impl Error for IndexOutOfBounds {}

/// Sorts siblings into display order.
pub fn in_display_order<'a, T: Sequenced>(items: impl IntoIterator<Item = &'a T>) -> Vec<&'a T>
where
    T: 'a,
{
    let mut sorted: Vec<&T> = items.into_iter().collect();
    sorted.sort_by_key(|item| (item.is_completed(), item.order(), item.sequence_id()));
    sorted
}

/// Order value for the slot at `position` in a dense group.
pub fn next_order(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

/// Order value for an item appended after `siblings`.
///
/// Equals the sibling count for a dense group; after a delete it still lands
/// past every survivor.
pub fn append_order<'a, T>(siblings: impl IntoIterator<Item = &'a T>) -> i64
where
    T: Sequenced + 'a,
{
    siblings
        .into_iter()
        .map(|item| item.order())
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Moves the sibling at `start_index` to `end_index` and renumbers the group.
///
/// `siblings` must already be in display order. Returns `Ok(None)` for a
/// no-op: a group of at most one member, or `start_index == end_index`.
/// Indices into a group of at most one member are not bounds-checked, so
/// `IndexOutOfBounds` is only reported for groups of two or more.
pub fn reorder<T: Sequenced>(
    siblings: &[&T],
    start_index: usize,
    end_index: usize,
) -> Result<Option<Vec<OrderAssignment>>, IndexOutOfBounds> {
    let len = siblings.len();
    if len <= 1 {
        return Ok(None);
    }
    for index in [start_index, end_index] {
        if index >= len {
            return Err(IndexOutOfBounds { index, len });
        }
    }
    if start_index == end_index {
        return Ok(None);
    }

    let mut ids: Vec<Uuid> = siblings.iter().map(|item| item.sequence_id()).collect();
    let moved = ids.remove(start_index);
    ids.insert(end_index, moved);

    Ok(Some(
        ids.into_iter()
            .enumerate()
            .map(|(position, id)| OrderAssignment {
                id,
                order: next_order(position),
            })
            .collect(),
    ))
}

/// Keeps only assignments that differ from the siblings' stored order.
pub fn changed_assignments<T: Sequenced>(
    siblings: &[&T],
    assignments: Vec<OrderAssignment>,
) -> Vec<OrderAssignment> {
    assignments
        .into_iter()
        .filter(|assignment| {
            siblings
                .iter()
                .find(|item| item.sequence_id() == assignment.id)
                .map_or(true, |item| item.order() != assignment.order)
        })
        .collect()
}
