//! In-memory entity snapshot.
//!
//! # Responsibility
//! - Hold one consistent id -> record view of every entity kind.
//! - Answer sibling/child queries used by aggregation and ordering.
//! - Apply mutation batches locally so a whole operation can be planned
//!   before it is submitted.
//!
//! # Invariants
//! - `apply` is all-or-nothing: on error the snapshot is left untouched.
//! - Child queries return records in ascending id order; callers sort for display.

use crate::model::concern::{Concern, ConcernId};
use crate::model::entity::{EntityKind, EntityRef, Record};
use crate::model::log_entry::now_epoch_ms;
use crate::model::memo::{Memo, MemoId};
use crate::model::step::{Step, StepId};
use crate::model::task::{Task, TaskId};
use crate::repo::mutation::{FieldUpdate, Mutation, MutationBatch, MutationError, MutationOp};
use std::collections::BTreeMap;

/// Consistent view of all records, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    tasks: BTreeMap<TaskId, Task>,
    steps: BTreeMap<StepId, Step>,
    memos: BTreeMap<MemoId, Memo>,
    concerns: BTreeMap<ConcernId, Concern>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from loaded record collections.
    pub fn from_records(
        tasks: impl IntoIterator<Item = Task>,
        steps: impl IntoIterator<Item = Step>,
        memos: impl IntoIterator<Item = Memo>,
        concerns: impl IntoIterator<Item = Concern>,
    ) -> Self {
        Self {
            tasks: tasks.into_iter().map(|task| (task.id, task)).collect(),
            steps: steps.into_iter().map(|step| (step.id, step)).collect(),
            memos: memos.into_iter().map(|memo| (memo.id, memo)).collect(),
            concerns: concerns
                .into_iter()
                .map(|concern| (concern.id, concern))
                .collect(),
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    pub fn memo(&self, id: MemoId) -> Option<&Memo> {
        self.memos.get(&id)
    }

    pub fn concern(&self, id: ConcernId) -> Option<&Concern> {
        self.concerns.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    pub fn memos(&self) -> impl Iterator<Item = &Memo> {
        self.memos.values()
    }

    pub fn concerns(&self) -> impl Iterator<Item = &Concern> {
        self.concerns.values()
    }

    pub fn contains(&self, target: EntityRef) -> bool {
        match target.kind {
            EntityKind::Task => self.tasks.contains_key(&target.id),
            EntityKind::Step => self.steps.contains_key(&target.id),
            EntityKind::Memo => self.memos.contains_key(&target.id),
            EntityKind::Concern => self.concerns.contains_key(&target.id),
        }
    }

    /// Returns every record of one kind.
    pub fn get_all(&self, kind: EntityKind) -> Vec<Record> {
        match kind {
            EntityKind::Task => self.tasks.values().cloned().map(Record::Task).collect(),
            EntityKind::Step => self.steps.values().cloned().map(Record::Step).collect(),
            EntityKind::Memo => self.memos.values().cloned().map(Record::Memo).collect(),
            EntityKind::Concern => self
                .concerns
                .values()
                .cloned()
                .map(Record::Concern)
                .collect(),
        }
    }

    /// Tasks sharing `parent` (`None` selects top-level Projects).
    pub fn tasks_under(&self, parent: Option<TaskId>) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.parent_task_id == parent)
            .collect()
    }

    pub fn steps_of(&self, task_id: TaskId) -> Vec<&Step> {
        self.steps
            .values()
            .filter(|step| step.parent_task_id == task_id)
            .collect()
    }

    pub fn memos_of(&self, step_id: StepId) -> Vec<&Memo> {
        self.memos
            .values()
            .filter(|memo| memo.parent_step_id == step_id)
            .collect()
    }

    pub fn tasks_derived_from(&self, concern_id: ConcernId) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|task| task.related_concern_id == Some(concern_id))
            .collect()
    }

    /// Applies `batch` in order; leaves `self` unchanged on any error.
    pub fn apply(&mut self, batch: &MutationBatch) -> Result<(), MutationError> {
        batch.validate()?;
        let mut next = self.clone();
        let now = now_epoch_ms();
        for mutation in batch {
            next.apply_one(mutation, now)?;
        }
        *self = next;
        Ok(())
    }

    fn apply_one(&mut self, mutation: &Mutation, now: i64) -> Result<(), MutationError> {
        let target = mutation.target;
        match &mutation.op {
            MutationOp::Insert(record) => {
                if self.contains(target) {
                    return Err(MutationError::DuplicateTarget(target));
                }
                match record.clone() {
                    Record::Task(task) => {
                        self.tasks.insert(task.id, task);
                    }
                    Record::Step(step) => {
                        self.steps.insert(step.id, step);
                    }
                    Record::Memo(memo) => {
                        self.memos.insert(memo.id, memo);
                    }
                    Record::Concern(concern) => {
                        self.concerns.insert(concern.id, concern);
                    }
                }
                Ok(())
            }
            MutationOp::Update(updates) => self.apply_updates(target, updates, now),
            MutationOp::Delete => {
                let removed = match target.kind {
                    EntityKind::Task => self.tasks.remove(&target.id).is_some(),
                    EntityKind::Step => self.steps.remove(&target.id).is_some(),
                    EntityKind::Memo => self.memos.remove(&target.id).is_some(),
                    EntityKind::Concern => self.concerns.remove(&target.id).is_some(),
                };
                if removed {
                    Ok(())
                } else {
                    Err(MutationError::MissingTarget(target))
                }
            }
        }
    }

    fn apply_updates(
        &mut self,
        target: EntityRef,
        updates: &[FieldUpdate],
        now: i64,
    ) -> Result<(), MutationError> {
        let missing = MutationError::MissingTarget(target);
        match target.kind {
            EntityKind::Task => {
                let task = self.tasks.get_mut(&target.id).ok_or(missing)?;
                for update in updates {
                    apply_task_field(task, update);
                }
                task.updated_at = now;
            }
            EntityKind::Step => {
                let step = self.steps.get_mut(&target.id).ok_or(missing)?;
                for update in updates {
                    apply_step_field(step, update);
                }
            }
            EntityKind::Memo => {
                let memo = self.memos.get_mut(&target.id).ok_or(missing)?;
                for update in updates {
                    apply_memo_field(memo, update);
                }
            }
            EntityKind::Concern => {
                let concern = self.concerns.get_mut(&target.id).ok_or(missing)?;
                for update in updates {
                    apply_concern_field(concern, update);
                }
                concern.updated_at = now;
            }
        }
        Ok(())
    }
}

// Field applicability is checked by `MutationBatch::validate`; foreign fields
// are ignored below.

fn apply_task_field(task: &mut Task, update: &FieldUpdate) {
    match update {
        FieldUpdate::Title(value) => task.title = value.clone(),
        FieldUpdate::Description(value) => task.description = value.clone(),
        FieldUpdate::Category(value) => task.category = *value,
        FieldUpdate::TaskStatus(value) => task.status = *value,
        FieldUpdate::ProgressPercent(value) => task.progress_percent = *value,
        FieldUpdate::Order(value) => task.order = *value,
        FieldUpdate::RelatedConcern(value) => task.related_concern_id = *value,
        FieldUpdate::AppendProgressLog(entry) => task.progress_log.push(entry.clone()),
        _ => {}
    }
}

fn apply_step_field(step: &mut Step, update: &FieldUpdate) {
    match update {
        FieldUpdate::Title(value) => step.title = value.clone(),
        FieldUpdate::StepStatus(value) => step.status = *value,
        FieldUpdate::Order(value) => step.order = *value,
        _ => {}
    }
}

fn apply_memo_field(memo: &mut Memo, update: &FieldUpdate) {
    match update {
        FieldUpdate::Content(value) => memo.content = value.clone(),
        FieldUpdate::Timestamp(value) => memo.timestamp_ms = *value,
        _ => {}
    }
}

fn apply_concern_field(concern: &mut Concern, update: &FieldUpdate) {
    match update {
        FieldUpdate::Title(value) => concern.title = value.clone(),
        FieldUpdate::Description(value) => concern.description = value.clone(),
        FieldUpdate::ResolutionAction(value) => concern.resolution_action = value.clone(),
        FieldUpdate::ConcernStatus(value) => concern.status = *value,
        FieldUpdate::AppendAnalysisLog(entry) => concern.analysis_log.push(entry.clone()),
        _ => {}
    }
}
