use lazyplan_core::db::open_db_in_memory;
use lazyplan_core::{
    EntityRef, EntityStore, ErrorKind, FieldUpdate, Mutation, MutationBatch, MutationError,
    Record, SqliteEntityStore, StepStatus, StoreError, Task, TaskCategory, TaskService,
    TaskStatus,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> TaskService<SqliteEntityStore<'_>> {
    TaskService::new(SqliteEntityStore::try_new(conn).unwrap())
}

#[test]
fn failed_cascade_leaves_step_and_tasks_untouched() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let step = service.add_step(sub_task.id, "a").unwrap();

    conn.execute_batch(
        "CREATE TRIGGER fail_task_update
         BEFORE UPDATE ON tasks
         BEGIN
             SELECT RAISE(ABORT, 'injected task update failure');
         END;",
    )
    .unwrap();

    let err = service.toggle_step(step.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.is_retryable());

    assert_eq!(
        service.list_steps(sub_task.id).unwrap()[0].status,
        StepStatus::Pending
    );
    let stored = service.get_task(sub_task.id).unwrap().unwrap();
    assert_eq!(
        (stored.progress_percent, stored.status),
        (0, TaskStatus::Pending)
    );

    conn.execute_batch("DROP TRIGGER fail_task_update;").unwrap();
    service.toggle_step(step.id).unwrap();
    assert_eq!(
        service.get_task(project.id).unwrap().unwrap().progress_percent,
        100
    );
}

#[test]
fn failed_cascade_delete_keeps_whole_hierarchy() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let step = service.add_step(sub_task.id, "a").unwrap();
    service.add_memo(step.id, "keep me").unwrap();

    conn.execute_batch(
        "CREATE TRIGGER fail_step_delete
         BEFORE DELETE ON steps
         BEGIN
             SELECT RAISE(ABORT, 'injected step delete failure');
         END;",
    )
    .unwrap();

    let err = service.delete_task(project.id).unwrap_err();
    assert!(err.is_retryable());

    assert!(service.get_task(project.id).unwrap().is_some());
    assert!(service.get_task(sub_task.id).unwrap().is_some());
    assert_eq!(service.list_steps(sub_task.id).unwrap().len(), 1);
    assert_eq!(service.list_memos(step.id).unwrap().len(), 1);
}

#[test]
fn stale_update_aborts_entire_batch() {
    let conn = setup();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let project = Task::new_project("Launch", "", TaskCategory::Project, 0);
    let ghost = Task::new_project("Ghost", "", TaskCategory::Project, 1);

    let batch = MutationBatch::from(vec![
        Mutation::insert(Record::Task(project.clone())),
        Mutation::update(
            EntityRef::task(ghost.id),
            vec![FieldUpdate::ProgressPercent(10)],
        ),
    ]);
    let err = store.apply_batch(&batch).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Mutation(MutationError::MissingTarget(target)) if target == EntityRef::task(ghost.id)
    ));

    let snapshot = store.load_snapshot().unwrap();
    assert!(snapshot.task(project.id).is_none());
}

#[test]
fn invalid_batch_is_rejected_before_any_write() {
    let conn = setup();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let project = Task::new_project("Launch", "", TaskCategory::Project, 0);

    let batch = MutationBatch::from(vec![
        Mutation::insert(Record::Task(project.clone())),
        Mutation::update(
            EntityRef::task(project.id),
            vec![FieldUpdate::StepStatus(StepStatus::Completed)],
        ),
    ]);
    let err = store.apply_batch(&batch).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Mutation(MutationError::FieldNotApplicable { .. })
    ));
    assert!(store.load_snapshot().unwrap().task(project.id).is_none());
}

#[test]
fn corrupted_row_is_reported_as_invalid_data() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();

    conn.execute(
        "UPDATE tasks SET parent_uuid = 'not-a-uuid' WHERE uuid = ?1;",
        [project.id.to_string()],
    )
    .unwrap_err();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute(
        "UPDATE tasks SET parent_uuid = 'not-a-uuid' WHERE uuid = ?1;",
        [project.id.to_string()],
    )
    .unwrap();

    let err = service.get_task(project.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.to_string().contains("tasks.parent_uuid"));
}
