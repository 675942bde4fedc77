//! Concern use-case service.
//!
//! # Responsibility
//! - Create, edit and delete concerns and append analysis notes.
//! - Derive resolution tasks from a concern.
//!
//! # Invariants
//! - Deleting a concern unlinks derived tasks; it never deletes them.
//! - Deriving a task and advancing the concern happen in one batch.
//! - Nothing here moves a concern to `Resolved`; callers decide that.

use crate::engine::ordering::append_order;
use crate::model::concern::{Concern, ConcernId, ConcernStatus};
use crate::model::entity::{EntityKind, EntityRef, Record};
use crate::model::log_entry::LogEntry;
use crate::model::task::{Task, TaskCategory};
use crate::repo::mutation::{FieldUpdate, Mutation};
use crate::repo::store::EntityStore;
use crate::service::error::{InvariantViolation, ServiceError};
use crate::service::{missing_target, normalize_text, normalize_title, submit, Outcome, Plan};

const DERIVED_TITLE_PREFIX: &str = "[Concern]";

/// Partial edit of concern text fields. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcernEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub resolution_action: Option<String>,
}

/// Concern service facade.
pub struct ConcernService<S: EntityStore> {
    store: S,
}

impl<S: EntityStore> ConcernService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a concern in `Analyzing` state.
    pub fn create_concern(
        &self,
        title: &str,
        description: &str,
        resolution_action: &str,
    ) -> Result<Concern, ServiceError> {
        let title = normalize_title(EntityKind::Concern, title)?;
        let concern = Concern::new(title, description.trim(), resolution_action.trim());

        let mut plan = Plan::new(self.store.load_snapshot()?);
        plan.push([Mutation::insert(Record::Concern(concern.clone()))])?;
        submit(&self.store, "concern_create", plan.into_batch())?;
        Ok(concern)
    }

    pub fn update_concern(
        &self,
        concern_id: ConcernId,
        edit: ConcernEdit,
    ) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(concern) = snapshot.concern(concern_id) else {
            return Ok(missing_target("concern_update", EntityRef::concern(concern_id)));
        };

        let mut updates = Vec::new();
        if let Some(title) = edit.title.as_deref() {
            let title = normalize_title(EntityKind::Concern, title)?;
            if title != concern.title {
                updates.push(FieldUpdate::Title(title));
            }
        }
        if let Some(description) = edit.description.as_deref() {
            let description = description.trim();
            if description != concern.description {
                updates.push(FieldUpdate::Description(description.to_string()));
            }
        }
        if let Some(resolution_action) = edit.resolution_action.as_deref() {
            let resolution_action = resolution_action.trim();
            if resolution_action != concern.resolution_action {
                updates.push(FieldUpdate::ResolutionAction(resolution_action.to_string()));
            }
        }
        if updates.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(EntityRef::concern(concern_id), updates)])?;
        submit(&self.store, "concern_update", plan.into_batch())
    }

    pub fn set_concern_status(
        &self,
        concern_id: ConcernId,
        status: ConcernStatus,
    ) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let Some(concern) = snapshot.concern(concern_id) else {
            return Ok(missing_target("concern_status", EntityRef::concern(concern_id)));
        };
        if concern.status == status {
            return Ok(Outcome::Unchanged);
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(
            EntityRef::concern(concern_id),
            vec![FieldUpdate::ConcernStatus(status)],
        )])?;
        submit(&self.store, "concern_status", plan.into_batch())
    }

    pub fn append_analysis_log(
        &self,
        concern_id: ConcernId,
        text: &str,
    ) -> Result<Outcome, ServiceError> {
        let text = normalize_text("analysis_log", text)?;
        let snapshot = self.store.load_snapshot()?;
        if snapshot.concern(concern_id).is_none() {
            return Ok(missing_target("concern_log_append", EntityRef::concern(concern_id)));
        }

        let mut plan = Plan::new(snapshot);
        plan.push([Mutation::update(
            EntityRef::concern(concern_id),
            vec![FieldUpdate::AppendAnalysisLog(LogEntry::now(text))],
        )])?;
        submit(&self.store, "concern_log_append", plan.into_batch())
    }

    /// Deletes a concern after clearing the back-reference on derived tasks.
    pub fn delete_concern(&self, concern_id: ConcernId) -> Result<Outcome, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        if snapshot.concern(concern_id).is_none() {
            return Ok(missing_target("concern_delete", EntityRef::concern(concern_id)));
        }

        let mut mutations: Vec<Mutation> = snapshot
            .tasks_derived_from(concern_id)
            .iter()
            .map(|task| {
                Mutation::update(
                    EntityRef::task(task.id),
                    vec![FieldUpdate::RelatedConcern(None)],
                )
            })
            .collect();
        mutations.push(Mutation::delete(EntityRef::concern(concern_id)));

        let mut plan = Plan::new(snapshot);
        plan.push(mutations)?;
        submit(&self.store, "concern_delete", plan.into_batch())
    }

    /// Creates a top-level `todo` task from the concern's resolution action
    /// and moves the concern to `SolutionDerived`.
    pub fn derive_task(&self, concern_id: ConcernId) -> Result<Task, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let concern = snapshot
            .concern(concern_id)
            .ok_or(ServiceError::UnknownReference(EntityRef::concern(concern_id)))?;
        if concern.is_resolved() {
            return Err(InvariantViolation::ConcernAlreadyResolved(concern_id).into());
        }

        let order = append_order(snapshot.tasks_under(None));
        let mut task = Task::new_project(
            format!("{DERIVED_TITLE_PREFIX} {}", concern.title),
            concern.resolution_action.as_str(),
            TaskCategory::Todo,
            order,
        );
        task.related_concern_id = Some(concern_id);
        task.progress_log = vec![LogEntry::new(
            task.created_at,
            format!("Derived from concern '{}'.", concern.title),
        )];

        let mut mutations = vec![Mutation::insert(Record::Task(task.clone()))];
        if concern.status != ConcernStatus::SolutionDerived {
            mutations.push(Mutation::update(
                EntityRef::concern(concern_id),
                vec![FieldUpdate::ConcernStatus(ConcernStatus::SolutionDerived)],
            ));
        }

        let mut plan = Plan::new(snapshot);
        plan.push(mutations)?;
        plan.recompute(task.id)?;
        submit(&self.store, "concern_derive_task", plan.into_batch())?;
        Ok(task)
    }

    /// Returns whether every task derived from the concern is completed.
    ///
    /// `false` when nothing was derived yet or the concern is unknown.
    pub fn resolution_ready(&self, concern_id: ConcernId) -> Result<bool, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        if snapshot.concern(concern_id).is_none() {
            return Ok(false);
        }
        let derived = snapshot.tasks_derived_from(concern_id);
        Ok(!derived.is_empty() && derived.iter().all(|task| task.is_completed()))
    }

    pub fn get_concern(&self, concern_id: ConcernId) -> Result<Option<Concern>, ServiceError> {
        Ok(self.store.load_snapshot()?.concern(concern_id).cloned())
    }

    /// Lists tasks derived from a concern, sorted by `order`.
    pub fn derived_tasks(&self, concern_id: ConcernId) -> Result<Vec<Task>, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let mut tasks: Vec<Task> = snapshot
            .tasks_derived_from(concern_id)
            .into_iter()
            .cloned()
            .collect();
        tasks.sort_by_key(|task| (task.order, task.id));
        Ok(tasks)
    }

    /// Lists all concerns, newest first.
    pub fn list_concerns(&self) -> Result<Vec<Concern>, ServiceError> {
        let snapshot = self.store.load_snapshot()?;
        let mut concerns: Vec<Concern> = snapshot.concerns().cloned().collect();
        concerns.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(concerns)
    }
}
