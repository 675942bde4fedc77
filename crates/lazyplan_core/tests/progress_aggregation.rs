use lazyplan_core::db::open_db_in_memory;
use lazyplan_core::{
    EntityRef, Outcome, SqliteEntityStore, StepStatus, TaskCategory, TaskService, TaskStatus,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> TaskService<SqliteEntityStore<'_>> {
    TaskService::new(SqliteEntityStore::try_new(conn).unwrap())
}

fn progress_of(service: &TaskService<SqliteEntityStore<'_>>, id: Uuid) -> (u8, TaskStatus) {
    let task = service.get_task(id).unwrap().unwrap();
    (task.progress_percent, task.status)
}

#[test]
fn sub_task_progress_follows_completed_step_ratio() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let steps: Vec<_> = ["Outline", "Draft", "Review"]
        .into_iter()
        .map(|title| service.add_step(sub_task.id, title).unwrap())
        .collect();
    assert_eq!(progress_of(&service, sub_task.id), (0, TaskStatus::Pending));

    service.toggle_step(steps[0].id).unwrap();
    assert_eq!(progress_of(&service, sub_task.id), (33, TaskStatus::InProgress));
    assert_eq!(progress_of(&service, project.id).0, 33);

    service
        .set_step_status(steps[1].id, StepStatus::Completed)
        .unwrap();
    assert_eq!(progress_of(&service, sub_task.id), (67, TaskStatus::InProgress));
    assert_eq!(progress_of(&service, project.id).0, 67);
}

#[test]
fn project_progress_is_rounded_mean_of_sub_tasks() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let s1 = service.create_sub_task(project.id, "S1", "").unwrap();
    let s2 = service.create_sub_task(project.id, "S2", "").unwrap();

    for title in ["a", "b"] {
        let step = service.add_step(s1.id, title).unwrap();
        service.toggle_step(step.id).unwrap();
    }
    for title in ["c", "d", "e", "f"] {
        service.add_step(s2.id, title).unwrap();
    }

    assert_eq!(progress_of(&service, s1.id).0, 100);
    assert_eq!(progress_of(&service, s2.id), (0, TaskStatus::Pending));
    assert_eq!(progress_of(&service, project.id).0, 50);
}

#[test]
fn step_toggle_cascades_within_one_batch() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Now)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Build", "").unwrap();
    let first = service.add_step(sub_task.id, "compile").unwrap();
    service.add_step(sub_task.id, "package").unwrap();

    // step + sub-task + project
    let outcome = service.toggle_step(first.id).unwrap();
    assert_eq!(outcome, Outcome::Committed { writes: 3 });
    assert_eq!(progress_of(&service, sub_task.id), (50, TaskStatus::InProgress));
    assert_eq!(progress_of(&service, project.id), (50, TaskStatus::Pending));
}

#[test]
fn completing_every_step_never_auto_completes_sub_task() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let steps: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|title| service.add_step(sub_task.id, title).unwrap())
        .collect();

    for step in &steps {
        service.toggle_step(step.id).unwrap();
    }
    assert_eq!(progress_of(&service, sub_task.id), (100, TaskStatus::InProgress));

    service
        .set_task_status(sub_task.id, TaskStatus::Completed)
        .unwrap();
    assert_eq!(progress_of(&service, sub_task.id), (100, TaskStatus::Completed));

    service.toggle_step(steps[2].id).unwrap();
    assert_eq!(progress_of(&service, sub_task.id), (67, TaskStatus::InProgress));
}

#[test]
fn explicit_completion_with_open_steps_is_pulled_back() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let done = service.add_step(sub_task.id, "a").unwrap();
    service.add_step(sub_task.id, "b").unwrap();
    service.toggle_step(done.id).unwrap();

    service
        .set_task_status(sub_task.id, TaskStatus::Completed)
        .unwrap();
    assert_eq!(progress_of(&service, sub_task.id), (50, TaskStatus::InProgress));
}

#[test]
fn projects_never_receive_automatic_status_changes() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let step = service.add_step(sub_task.id, "a").unwrap();

    service.toggle_step(step.id).unwrap();
    assert_eq!(progress_of(&service, project.id), (100, TaskStatus::Pending));
}

#[test]
fn new_sub_task_lowers_project_mean() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let s1 = service.create_sub_task(project.id, "S1", "").unwrap();
    let step = service.add_step(s1.id, "a").unwrap();
    service.toggle_step(step.id).unwrap();
    assert_eq!(progress_of(&service, project.id).0, 100);

    let s2 = service.create_sub_task(project.id, "S2", "").unwrap();
    assert_eq!(progress_of(&service, s2.id), (0, TaskStatus::Pending));
    assert_eq!(progress_of(&service, project.id).0, 50);
}

#[test]
fn deleting_a_step_recomputes_remaining_ratio() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let done = service.add_step(sub_task.id, "a").unwrap();
    let open = service.add_step(sub_task.id, "b").unwrap();
    service.toggle_step(done.id).unwrap();
    assert_eq!(progress_of(&service, sub_task.id).0, 50);

    service.delete_step(open.id).unwrap();
    assert_eq!(progress_of(&service, sub_task.id).0, 100);
    assert_eq!(progress_of(&service, project.id).0, 100);
}

#[test]
fn recompute_is_idempotent_and_tolerates_missing_tasks() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let step = service.add_step(sub_task.id, "a").unwrap();
    service.toggle_step(step.id).unwrap();

    assert_eq!(
        service.recompute_progress(sub_task.id).unwrap(),
        Outcome::Unchanged
    );
    assert_eq!(
        service.recompute_progress(project.id).unwrap(),
        Outcome::Unchanged
    );

    let missing = Uuid::new_v4();
    assert_eq!(
        service.recompute_progress(missing).unwrap(),
        Outcome::MissingTarget(EntityRef::task(missing))
    );
}

#[test]
fn sub_task_without_steps_keeps_its_progress() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Empty", "").unwrap();

    assert_eq!(
        service.recompute_progress(sub_task.id).unwrap(),
        Outcome::Unchanged
    );
    assert_eq!(progress_of(&service, sub_task.id), (0, TaskStatus::Pending));
    assert_eq!(progress_of(&service, project.id).0, 0);
}
