use lazyplan_core::db::open_db_in_memory;
use lazyplan_core::{
    ConcernEdit, ConcernService, ConcernStatus, EntityRef, InvariantViolation, Outcome,
    ServiceError, SqliteEntityStore, TaskCategory, TaskService, TaskStatus,
};
use rusqlite::Connection;
use std::thread::sleep;
use std::time::Duration;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn concerns(conn: &Connection) -> ConcernService<SqliteEntityStore<'_>> {
    ConcernService::new(SqliteEntityStore::try_new(conn).unwrap())
}

fn tasks(conn: &Connection) -> TaskService<SqliteEntityStore<'_>> {
    TaskService::new(SqliteEntityStore::try_new(conn).unwrap())
}

#[test]
fn create_concern_starts_analyzing_with_creation_log() {
    let conn = setup();
    let service = concerns(&conn);

    let concern = service
        .create_concern("Sleep schedule", "Late nights", " Set a 23:00 alarm ")
        .unwrap();

    let stored = service.get_concern(concern.id).unwrap().unwrap();
    assert_eq!(stored.status, ConcernStatus::Analyzing);
    assert_eq!(stored.resolution_action, "Set a 23:00 alarm");
    assert_eq!(stored.analysis_log.len(), 1);
    assert_eq!(stored.analysis_log[0].text, "Concern created.");
}

#[test]
fn derive_task_creates_linked_todo_and_advances_concern() {
    let conn = setup();
    let service = concerns(&conn);
    let task_service = tasks(&conn);
    task_service
        .create_project("Existing", "", TaskCategory::Now)
        .unwrap();
    let concern = service
        .create_concern("Sleep schedule", "", "Set an alarm")
        .unwrap();

    let task = service.derive_task(concern.id).unwrap();

    let stored = task_service.get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.title, "[Concern] Sleep schedule");
    assert_eq!(stored.description, "Set an alarm");
    assert_eq!(stored.category, TaskCategory::Todo);
    assert_eq!(stored.parent_task_id, None);
    assert_eq!(stored.related_concern_id, Some(concern.id));
    assert_eq!(stored.order, 1);
    assert_eq!(stored.progress_log.len(), 1);
    assert!(stored.progress_log[0].text.contains("Sleep schedule"));

    let concern = service.get_concern(concern.id).unwrap().unwrap();
    assert_eq!(concern.status, ConcernStatus::SolutionDerived);
    assert_eq!(service.derived_tasks(concern.id).unwrap(), vec![stored]);
}

#[test]
fn resolved_concern_cannot_derive_tasks() {
    let conn = setup();
    let service = concerns(&conn);
    let concern = service.create_concern("Done", "", "").unwrap();
    service
        .set_concern_status(concern.id, ConcernStatus::Resolved)
        .unwrap();

    let err = service.derive_task(concern.id).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Invariant(InvariantViolation::ConcernAlreadyResolved(id)) if id == concern.id
    ));
    assert!(service.derived_tasks(concern.id).unwrap().is_empty());

    let missing = Uuid::new_v4();
    let err = service.derive_task(missing).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::UnknownReference(target) if target == EntityRef::concern(missing)
    ));
}

#[test]
fn deleting_concern_keeps_derived_tasks_but_unlinks_them() {
    let conn = setup();
    let service = concerns(&conn);
    let task_service = tasks(&conn);
    let concern = service.create_concern("Budget", "", "Track spending").unwrap();
    let first = service.derive_task(concern.id).unwrap();
    let second = service.derive_task(concern.id).unwrap();

    let outcome = service.delete_concern(concern.id).unwrap();
    // two unlinks + the concern itself
    assert_eq!(outcome, Outcome::Committed { writes: 3 });

    assert!(service.get_concern(concern.id).unwrap().is_none());
    for id in [first.id, second.id] {
        let task = task_service.get_task(id).unwrap().unwrap();
        assert_eq!(task.related_concern_id, None);
    }
    assert_eq!(
        service.delete_concern(concern.id).unwrap(),
        Outcome::MissingTarget(EntityRef::concern(concern.id))
    );
}

#[test]
fn resolution_ready_requires_all_derived_tasks_completed() {
    let conn = setup();
    let service = concerns(&conn);
    let task_service = tasks(&conn);
    let concern = service.create_concern("Budget", "", "Track spending").unwrap();
    assert!(!service.resolution_ready(concern.id).unwrap());

    let first = service.derive_task(concern.id).unwrap();
    let second = service.derive_task(concern.id).unwrap();
    assert!(!service.resolution_ready(concern.id).unwrap());

    task_service
        .set_task_status(first.id, TaskStatus::Completed)
        .unwrap();
    assert!(!service.resolution_ready(concern.id).unwrap());

    task_service
        .set_task_status(second.id, TaskStatus::Completed)
        .unwrap();
    assert!(service.resolution_ready(concern.id).unwrap());
    assert_eq!(
        service.get_concern(concern.id).unwrap().unwrap().status,
        ConcernStatus::SolutionDerived
    );
}

#[test]
fn analysis_log_and_edits_are_persisted() {
    let conn = setup();
    let service = concerns(&conn);
    let concern = service.create_concern("Career", "", "").unwrap();

    service
        .append_analysis_log(concern.id, "Talked to a mentor")
        .unwrap();
    let outcome = service
        .update_concern(
            concern.id,
            ConcernEdit {
                description: Some("Stuck at current role".to_string()),
                resolution_action: Some("Apply to two teams".to_string()),
                ..ConcernEdit::default()
            },
        )
        .unwrap();
    assert_eq!(outcome, Outcome::Committed { writes: 1 });

    let stored = service.get_concern(concern.id).unwrap().unwrap();
    assert_eq!(stored.description, "Stuck at current role");
    assert_eq!(stored.resolution_action, "Apply to two teams");
    let texts: Vec<&str> = stored
        .analysis_log
        .iter()
        .map(|entry| entry.text.as_str())
        .collect();
    assert_eq!(texts, vec!["Concern created.", "Talked to a mentor"]);

    assert_eq!(
        service
            .update_concern(
                concern.id,
                ConcernEdit {
                    title: Some("Career".to_string()),
                    ..ConcernEdit::default()
                },
            )
            .unwrap(),
        Outcome::Unchanged
    );
    let err = service.append_analysis_log(concern.id, "  ").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Invariant(InvariantViolation::BlankText { .. })
    ));
}

#[test]
fn list_concerns_returns_newest_first() {
    let conn = setup();
    let service = concerns(&conn);
    let older = service.create_concern("Older", "", "").unwrap();
    sleep(Duration::from_millis(5));
    let newer = service.create_concern("Newer", "", "").unwrap();

    let ids: Vec<Uuid> = service
        .list_concerns()
        .unwrap()
        .into_iter()
        .map(|concern| concern.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
