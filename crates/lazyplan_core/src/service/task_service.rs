//! Task, step and memo use-case service.
//!
//! # Responsibility
//! - Create, edit and delete tasks, steps and memos.
//! - Recompute progress in the same batch as every write that can move it.
//! - Validate reorder requests and persist only changed order keys.
//!
//! # Invariants
//! - Sub-tasks are created only under Projects; steps only under Sub-tasks.
//! - New siblings are appended one past the largest sibling `order`.
//! - Deletes cascade memos -> steps -> sub-tasks -> task inside one batch.
//! - Memo writes and reorders never trigger recomputation.
//! - Absent update/delete targets are reported as `Outcome::MissingTarget`.

use crate::engine::ordering::{
    append_order, changed_assignments, in_display_order, reorder, IndexOutOfBounds,
    OrderAssignment, Sequenced, SiblingGroup,
};
use crate::engine::snapshot::Snapshot;
use crate::model::entity::{EntityKind, EntityRef, Record};
use crate::model::log_entry::{now_epoch_ms, LogEntry};
use crate::model::memo::{Memo, MemoId};
use crate::model::step::{Step, StepId, StepStatus};
use crate::model::task::{Task, TaskCategory, TaskId, TaskStatus};
use crate::repo::mutation::{FieldUpdate, Mutation};
use crate::repo::store::EntityStore;
use crate::service::error::{InvariantViolation, ServiceError};
use crate::service::{missing_target, normalize_text, normalize_title, submit, Outcome, Plan};

/// Partial edit of user-owned task fields. `None` keeps the current value.
///
/// Progress and status are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TaskCategory>,
}

/// Drag-style move inside one sibling group.
///
/// `start_index`/`end_index` address the group's display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderRequest {
    pub source: SiblingGroup,
    pub target: SiblingGroup,
    pub start_index: usize,
    pub end_index: usize,
}

impl ReorderRequest {
    /// Move that stays inside `group`.
    pub fn within(group: SiblingGroup, start_index: usize, end_index: usize) -> Self {
        Self {
            source: group,
            target: group,
            start_index,
            end_index,
        }
    }
}

/// Top-level tasks split into board columns, each sorted by `order`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub projects: Vec<Task>,
    pub now: Vec<Task>,
    pub todo: Vec<Task>,
}

impl Board {
    pub fn column(&self, category: TaskCategory) -> &[Task] {
        match category {
            TaskCategory::Project => &self.projects,
            TaskCategory::Now => &self.now,
            TaskCategory::Todo => &self.todo,
        }
    }
}

/// Task hierarchy service facade.
pub struct TaskService<S: EntityStore> {
    store: S,
}

impl<S: EntityStore> TaskService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a top-level Project appended to the root sibling group.
    pub fn create_project(
        &self,
        title: &str,
        description: &str,
        category: TaskCategory,
    ) -> Result<Task, ServiceError> {
        let title = normalize_title(EntityKind::Task, title)?;
        let snapshot = self.store.load_snapshot()?;

        let order = append_order(snapshot.tasks_under(None));
        let project = Task::new_project(title, description.trim(), category, order);

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::insert(Record::Task(project.clone()))])?;
        plan.recompute(project.id)?;
        submit(&self.store, "task_create", plan.into_batch())?;
        Ok(project)
    }

    /// Creates a Sub-task under `project_id`, inheriting its category.
    ///
    /// The Project's mean is recomputed with the new 0% child included.
    pub fn create_sub_task(
        &self,
        project_id: TaskId,
        title: &str,
        description: &str,
    ) -> Result<Task, ServiceError> {
        let title = normalize_title(EntityKind::Task, title)?;
        let snapshot = self.store.load_snapshot()?;

        let project = snapshot
            .task(project_id)
            .ok_or(ServiceError::UnknownReference(EntityRef::task(project_id)))?;
        if !project.is_project() {
            return Err(InvariantViolation::ParentMustBeProject(project_id).into());
        }
        let order = append_order(snapshot.tasks_under(Some(project_id)));
        let sub_task = Task::new_sub_task(project, title, description.trim(), order);

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::insert(Record::Task(sub_task.clone()))])?;
        plan.recompute(sub_task.id)?;
        submit(&self.store, "task_create", plan.into_batch())?;
        Ok(sub_task)
    }

    /// Applies a partial field edit; never writes progress.
    pub fn update_task(&self, task_id: TaskId, edit: TaskEdit) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(task) = snapshot.task(task_id) else {
            return Ok(missing_target("task_update", EntityRef::task(task_id)));
        };

        let mut updates = Vec::new();
        if let Some(title) = edit.title.as_deref() {
            let title = normalize_title(EntityKind::Task, title)?;
            if title != task.title {
                updates.push(FieldUpdate::Title(title));
            }
        }
        if let Some(description) = edit.description.as_deref() {
            let description = description.trim();
            if description != task.description {
                updates.push(FieldUpdate::Description(description.to_string()));
            }
        }
        if let Some(category) = edit.category {
            if category != task.category {
                updates.push(FieldUpdate::Category(category));
            }
        }

        let mut plan = Plan::new(snapshot);
        if !updates.is_empty() {
            plan.push([Mutation::update(EntityRef::task(task_id), updates)])?;
        }
        plan.recompute(task_id)?;
        submit(&self.store, "task_update", plan.into_batch())
    }

    /// Explicit status change; the only way a task becomes `Completed`.
    ///
    /// Recomputation still runs, so a Sub-task with unfinished steps is
    /// pulled back to the status its steps imply.
    pub fn set_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(task) = snapshot.task(task_id) else {
            return Ok(missing_target("task_status", EntityRef::task(task_id)));
        };
        let changed = task.status != status;

        let mut plan = Plan::new(snapshot);
        if changed {
            plan.push([Mutation::update(
                EntityRef::task(task_id),
                vec![FieldUpdate::TaskStatus(status)],
            )])?;
        }
        plan.recompute(task_id)?;
        submit(&self.store, "task_status", plan.into_batch())
    }

    pub fn append_progress_log(&self, task_id: TaskId, text: &str) -> Result<Outcome, ServiceError> {
        let text = normalize_text("progress_log", text)?;
        let snapshot = self.store.load_snapshot()?;
        if snapshot.task(task_id).is_none() {
            return Ok(missing_target("task_log_append", EntityRef::task(task_id)));
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(
            EntityRef::task(task_id),
            vec![FieldUpdate::AppendProgressLog(LogEntry::now(text))],
        )])?;
        submit(&self.store, "task_log_append", plan.into_batch())
    }

    /// Deletes a task with its sub-tasks, steps and memos, then recomputes
    /// the parent Project when a Sub-task was removed.
    pub fn delete_task(&self, task_id: TaskId) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(task) = snapshot.task(task_id) else {
            return Ok(missing_target("task_delete", EntityRef::task(task_id)));
        };
        let parent_id = task.parent_task_id;

        let mut doomed: Vec<TaskId> = snapshot
            .tasks_under(Some(task_id))
            .iter()
            .map(|child| child.id)
            .collect();
        doomed.push(task_id);

        let mut mutations = Vec::new();
        for id in doomed {
            for step in snapshot.steps_of(id) {
                mutations.extend(step_delete_mutations(&snapshot, step.id));
            }
            mutations.push(Mutation::delete(EntityRef::task(id)));
        }

        let mut plan = Plan::new(snapshot);
        plan.push(mutations)?;
        if let Some(parent_id) = parent_id {
            plan.recompute(parent_id)?;
        }
        submit(&self.store, "task_delete", plan.into_batch())
    }

    /// Appends a step to a Sub-task and recomputes its progress.
    pub fn add_step(&self, task_id: TaskId, title: &str) -> Result<Step, ServiceError> {
        let title = normalize_title(EntityKind::Step, title)?;
        let snapshot = self.store.load_snapshot()?;

        let task = snapshot
            .task(task_id)
            .ok_or(ServiceError::UnknownReference(EntityRef::task(task_id)))?;
        if task.is_project() {
            return Err(InvariantViolation::StepParentMustBeSubTask(task_id).into());
        }
        let step = Step::new(task_id, title, append_order(snapshot.steps_of(task_id)));

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::insert(Record::Step(step.clone()))])?;
        plan.recompute(task_id)?;
        submit(&self.store, "step_create", plan.into_batch())?;
        Ok(step)
    }

    pub fn rename_step(&self, step_id: StepId, title: &str) -> Result<Outcome, ServiceError> {
        let title = normalize_title(EntityKind::Step, title)?;
        let snapshot = self.store.load_snapshot()?;
        let Some(step) = snapshot.step(step_id) else {
            return Ok(missing_target("step_rename", EntityRef::step(step_id)));
        };
        if step.title == title {
            return Ok(Outcome::Unchanged);
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(
            EntityRef::step(step_id),
            vec![FieldUpdate::Title(title)],
        )])?;
        submit(&self.store, "step_rename", plan.into_batch())
    }

    pub fn set_step_status(
        &self,
        step_id: StepId,
        status: StepStatus,
    ) -> Result<Outcome, ServiceError> {
        self.change_step_status(step_id, |_| status)
    }

    /// Flips a step between pending and completed.
    pub fn toggle_step(&self, step_id: StepId) -> Result<Outcome, ServiceError> {
        self.change_step_status(step_id, StepStatus::toggled)
    }

    /// Deletes a step with its memos and recomputes the owning Sub-task.
    pub fn delete_step(&self, step_id: StepId) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(step) = snapshot.step(step_id) else {
            return Ok(missing_target("step_delete", EntityRef::step(step_id)));
        };
        let task_id = step.parent_task_id;
        let mutations = step_delete_mutations(&snapshot, step_id);

        let mut plan = Plan::new(snapshot);
        plan.push(mutations)?;
        plan.recompute(task_id)?;
        submit(&self.store, "step_delete", plan.into_batch())
    }

    pub fn add_memo(&self, step_id: StepId, content: &str) -> Result<Memo, ServiceError> {
        let content = normalize_text("content", content)?;
        let snapshot = self.store.load_snapshot()?;
        if snapshot.step(step_id).is_none() {
            return Err(ServiceError::UnknownReference(EntityRef::step(step_id)));
        }
        let memo = Memo::new(step_id, content);

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::insert(Record::Memo(memo.clone()))])?;
        submit(&self.store, "memo_create", plan.into_batch())?;
        Ok(memo)
    }

    /// Replaces memo content and refreshes its timestamp.
    pub fn update_memo(&self, memo_id: MemoId, content: &str) -> Result<Outcome, ServiceError> {
        let content = normalize_text("content", content)?;
        let snapshot = self.store.load_snapshot()?;
        let Some(memo) = snapshot.memo(memo_id) else {
            return Ok(missing_target("memo_update", EntityRef::memo(memo_id)));
        };
        if memo.content == content {
            return Ok(Outcome::Unchanged);
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(
            EntityRef::memo(memo_id),
            vec![
                FieldUpdate::Content(content),
                FieldUpdate::Timestamp(now_epoch_ms()),
            ],
        )])?;
        submit(&self.store, "memo_update", plan.into_batch())
    }

    pub fn delete_memo(&self, memo_id: MemoId) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        if snapshot.memo(memo_id).is_none() {
            return Ok(missing_target("memo_delete", EntityRef::memo(memo_id)));
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::delete(EntityRef::memo(memo_id))])?;
        submit(&self.store, "memo_delete", plan.into_batch())
    }

    /// Recomputes one task and, for a Sub-task, its Project.
    pub fn recompute_progress(&self, task_id: TaskId) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        if snapshot.task(task_id).is_none() {
            return Ok(missing_target("progress_recompute", EntityRef::task(task_id)));
        }

        let mut plan = Plan::new(snapshot);
        plan.recompute(task_id)?;
        submit(&self.store, "progress_recompute", plan.into_batch())
    }

    /// Moves one sibling inside its group and persists changed order keys.
    ///
    /// # Errors
    /// - `CrossGroupMove` when source and target groups differ.
    /// - `IndexOutOfBounds` when an index falls outside a group of two or more.
    pub fn reorder(&self, request: ReorderRequest) -> Result<Outcome, ServiceError> {
        if request.source != request.target {
            return Err(InvariantViolation::CrossGroupMove {
                source: request.source,
                target: request.target,
            }
            .into());
        }

        let group = request.source;
        let snapshot = self.store.load_snapshot()?;
        let owner = match group {
            SiblingGroup::Tasks { parent } => parent,
            SiblingGroup::Steps { task } => Some(task),
        };
        if let Some(owner_id) = owner {
            if snapshot.task(owner_id).is_none() {
                return Ok(missing_target("sequence_reorder", EntityRef::task(owner_id)));
            }
        }

        let assignments = match group {
            SiblingGroup::Tasks { parent } => planned_assignments(
                &in_display_order(snapshot.tasks_under(parent)),
                request.start_index,
                request.end_index,
            )?,
            SiblingGroup::Steps { task } => planned_assignments(
                &in_display_order(snapshot.steps_of(task)),
                request.start_index,
                request.end_index,
            )?,
        };

        let kind = group.member_kind();
        let mut plan = Plan::new(snapshot);
        plan.push(assignments.into_iter().map(|assignment| {
            Mutation::update(
                EntityRef::new(kind, assignment.id),
                vec![FieldUpdate::Order(assignment.order)],
            )
        }))?;
        submit(&self.store, "sequence_reorder", plan.into_batch())
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<Option<Task>, ServiceError> {
        Ok(self.store.load_snapshot()?.task(task_id).cloned())
    }

    /// Lists a Project's Sub-tasks in display order.
    pub fn list_sub_tasks(&self, project_id: TaskId) -> Result<Vec<Task>, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        Ok(in_display_order(snapshot.tasks_under(Some(project_id)))
            .into_iter()
            .cloned()
            .collect())
    }

    /// Lists a Sub-task's steps in display order.
    pub fn list_steps(&self, task_id: TaskId) -> Result<Vec<Step>, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        Ok(in_display_order(snapshot.steps_of(task_id))
            .into_iter()
            .cloned()
            .collect())
    }

    /// Lists a step's memos, oldest first.
    pub fn list_memos(&self, step_id: StepId) -> Result<Vec<Memo>, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let mut memos: Vec<Memo> = snapshot.memos_of(step_id).into_iter().cloned().collect();
        memos.sort_by_key(|memo| (memo.timestamp_ms, memo.id));
        Ok(memos)
    }

    /// Groups top-level tasks by category.
    pub fn board(&self) -> Result<Board, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let mut roots = snapshot.tasks_under(None);
        roots.sort_by_key(|task| (task.order, task.id));

        let mut board = Board::default();
        for task in roots {
            let column = match task.category {
                TaskCategory::Project => &mut board.projects,
                TaskCategory::Now => &mut board.now,
                TaskCategory::Todo => &mut board.todo,
            };
            column.push(task.clone());
        }
        Ok(board)
    }

    fn change_step_status(
        &self,
        step_id: StepId,
        next: impl FnOnce(StepStatus) -> StepStatus,
    ) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(step) = snapshot.step(step_id) else {
            return Ok(missing_target("step_status", EntityRef::step(step_id)));
        };
        let task_id = step.parent_task_id;
        let status = next(step.status);
        let changed = status != step.status;

        let mut plan = Plan::new(snapshot);
        if changed {
            plan.push([Mutation::update(
                EntityRef::step(step_id),
                vec![FieldUpdate::StepStatus(status)],
            )])?;
        }
        plan.recompute(task_id)?;
        submit(&self.store, "step_status", plan.into_batch())
    }
}

/// Memo deletes followed by the step delete.
fn step_delete_mutations(snapshot: &Snapshot, step_id: StepId) -> Vec<Mutation> {
    let mut mutations: Vec<Mutation> = snapshot
        .memos_of(step_id)
        .iter()
        .map(|memo| Mutation::delete(EntityRef::memo(memo.id)))
        .collect();
    mutations.push(Mutation::delete(EntityRef::step(step_id)));
    mutations
}

fn planned_assignments<T: Sequenced>(
    siblings: &[&T],
    start_index: usize,
    end_index: usize,
) -> Result<Vec<OrderAssignment>, IndexOutOfBounds> {
    Ok(match reorder(siblings, start_index, end_index)? {
        Some(assignments) => changed_assignments(siblings, assignments),
        None => Vec::new(),
    })
}
