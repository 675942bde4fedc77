//! Hierarchy aggregation of task progress.
//!
//! # Responsibility
//! - Derive a Sub-task's progress and status from its Steps.
//! - Derive a Project's progress from its Sub-tasks.
//! - Cascade a Sub-task recomputation to its Project, one hop only.
//!
//! # Invariants
//! - Sub-task: `progress = round(100 * completed / total)`; untouched with no steps.
//! - Project: `progress = round(mean(sub-task progress))`; `0` with no sub-tasks.
//! - Status is only ever auto-set to `Pending`/`InProgress`, never `Completed`.
//! - Projects never receive an automatic status change.
//! - Rounding is half-away-from-zero in integer arithmetic; empty sets
//!   short-circuit before any division.
//! - Recomputing twice over unchanged input yields the same result.

use crate::engine::snapshot::Snapshot;
use crate::model::entity::EntityRef;
use crate::model::step::Step;
use crate::model::task::{Task, TaskId, TaskStatus};
use crate::repo::mutation::{FieldUpdate, Mutation, MutationBatch};

/// Completed/total step counts for one Sub-task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepTally {
    pub completed: usize,
    pub total: usize,
}

impl StepTally {
    pub fn of<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Self {
        steps.into_iter().fold(Self::default(), |tally, step| Self {
            completed: tally.completed + usize::from(step.is_completed()),
            total: tally.total + 1,
        })
    }

    /// Returns `None` when there are no steps.
    pub fn percent(&self) -> Option<u8> {
        rounded_percent(self.completed, self.total)
    }

    /// Infers the status implied by this tally.
    ///
    /// Counts decide, not the rounded percentage: 199 of 200 steps rounds to
    /// 100% but is still in progress. When every step is complete the current
    /// status is kept; moving to `Completed` needs an explicit user decision.
    pub fn inferred_status(&self, current: TaskStatus) -> TaskStatus {
        if self.total == 0 {
            current
        } else if self.completed == 0 {
            TaskStatus::Pending
        } else if self.completed < self.total {
            TaskStatus::InProgress
        } else {
            current
        }
    }
}

/// `round(100 * part / whole)` with half-away-from-zero rounding.
pub fn rounded_percent(part: usize, whole: usize) -> Option<u8> {
    if whole == 0 {
        return None;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;
    let percent = (200 * part + whole) / (2 * whole);
    u8::try_from(percent).ok()
}

/// Rounded arithmetic mean of percentages; `0` for an empty input.
pub fn rounded_mean(values: impl IntoIterator<Item = u8>) -> u8 {
    let (sum, count) = values
        .into_iter()
        .fold((0_u64, 0_u64), |(sum, count), value| {
            (sum + u64::from(value), count + 1)
        });
    if count == 0 {
        return 0;
    }
    let mean = (2 * sum + count) / (2 * count);
    u8::try_from(mean).unwrap_or(100)
}

/// Target progress/status for one task after recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressChange {
    pub task_id: TaskId,
    pub progress_percent: u8,
    pub status: TaskStatus,
}

impl ProgressChange {
    fn unchanged(task: &Task) -> Self {
        Self {
            task_id: task.id,
            progress_percent: task.progress_percent,
            status: task.status,
        }
    }

    /// Field writes needed to move `task` to this state; empty when already there.
    fn field_updates(&self, task: &Task) -> Vec<FieldUpdate> {
        let mut updates = Vec::new();
        if task.progress_percent != self.progress_percent {
            updates.push(FieldUpdate::ProgressPercent(self.progress_percent));
        }
        if task.status != self.status {
            updates.push(FieldUpdate::TaskStatus(self.status));
        }
        updates
    }
}

/// Ordered recomputation result: the target task first, then its Project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressPlan {
    changes: Vec<(ProgressChange, Vec<FieldUpdate>)>,
}

impl ProgressPlan {
    fn record(&mut self, task: &Task, change: ProgressChange) {
        let updates = change.field_updates(task);
        self.changes.push((change, updates));
    }

    /// Every recomputed task, including ones whose values did not change.
    pub fn changes(&self) -> impl Iterator<Item = &ProgressChange> {
        self.changes.iter().map(|(change, _)| change)
    }

    pub fn change_for(&self, task_id: TaskId) -> Option<&ProgressChange> {
        self.changes().find(|change| change.task_id == task_id)
    }

    pub fn is_noop(&self) -> bool {
        self.changes.iter().all(|(_, updates)| updates.is_empty())
    }

    /// Converts the effective changes into task updates.
    pub fn into_batch(self) -> MutationBatch {
        let mut batch = MutationBatch::new();
        for (change, updates) in self.changes {
            if !updates.is_empty() {
                batch.push(Mutation::update(EntityRef::task(change.task_id), updates));
            }
        }
        batch
    }
}

/// Recomputes `task_id` and, for a Sub-task, its Project.
///
/// Returns `None` when `task_id` is not in the snapshot.
pub fn plan_recompute(snapshot: &Snapshot, task_id: TaskId) -> Option<ProgressPlan> {
    let task = snapshot.task(task_id)?;
    let mut plan = ProgressPlan::default();

    match task.parent_task_id {
        None => {
            let change = recompute_project(snapshot, task, None);
            plan.record(task, change);
        }
        Some(project_id) => {
            let change = recompute_sub_task(snapshot, task);
            plan.record(task, change);
            // Depth is fixed at two levels, so one hop reaches the top.
            if let Some(project) = snapshot.task(project_id) {
                let project_change = recompute_project(snapshot, project, Some(&change));
                plan.record(project, project_change);
            }
        }
    }

    Some(plan)
}

fn recompute_sub_task(snapshot: &Snapshot, task: &Task) -> ProgressChange {
    let tally = StepTally::of(snapshot.steps_of(task.id));
    match tally.percent() {
        None => ProgressChange::unchanged(task),
        Some(progress_percent) => ProgressChange {
            task_id: task.id,
            progress_percent,
            status: tally.inferred_status(task.status),
        },
    }
}

fn recompute_project(
    snapshot: &Snapshot,
    project: &Task,
    pending_child: Option<&ProgressChange>,
) -> ProgressChange {
    let children = snapshot.tasks_under(Some(project.id));
    let progress_percent = rounded_mean(children.iter().map(|child| match pending_child {
        Some(change) if change.task_id == child.id => change.progress_percent,
        _ => child.progress_percent,
    }));
    ProgressChange {
        task_id: project.id,
        progress_percent,
        status: project.status,
    }
}
