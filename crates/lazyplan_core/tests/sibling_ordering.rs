use lazyplan_core::db::open_db_in_memory;
use lazyplan_core::{
    EntityRef, ErrorKind, IndexOutOfBounds, InvariantViolation, Outcome, ReorderRequest,
    ServiceError, SiblingGroup, SqliteEntityStore, TaskCategory, TaskService,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> TaskService<SqliteEntityStore<'_>> {
    TaskService::new(SqliteEntityStore::try_new(conn).unwrap())
}

fn sub_task_orders(service: &TaskService<SqliteEntityStore<'_>>, project_id: Uuid) -> Vec<(Uuid, i64)> {
    service
        .list_sub_tasks(project_id)
        .unwrap()
        .into_iter()
        .map(|task| (task.id, task.order))
        .collect()
}

#[test]
fn move_first_to_third_matches_splice_result() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let [a, b, c, d] = ["A", "B", "C", "D"]
        .map(|title| service.create_sub_task(project.id, title, "").unwrap());

    let outcome = service
        .reorder(ReorderRequest::within(
            SiblingGroup::Tasks {
                parent: Some(project.id),
            },
            0,
            2,
        ))
        .unwrap();
    // D keeps order 3, so only three keys are written.
    assert_eq!(outcome, Outcome::Committed { writes: 3 });

    assert_eq!(
        sub_task_orders(&service, project.id),
        vec![(b.id, 0), (c.id, 1), (a.id, 2), (d.id, 3)]
    );
}

#[test]
fn reorder_after_delete_normalizes_gaps() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let sub_task = service.create_sub_task(project.id, "Docs", "").unwrap();
    let steps: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|title| service.add_step(sub_task.id, title).unwrap())
        .collect();

    service.delete_step(steps[1].id).unwrap();
    let orders: Vec<i64> = service
        .list_steps(sub_task.id)
        .unwrap()
        .iter()
        .map(|step| step.order)
        .collect();
    assert_eq!(orders, vec![0, 2, 3]);

    service
        .reorder(ReorderRequest::within(
            SiblingGroup::Steps { task: sub_task.id },
            0,
            2,
        ))
        .unwrap();
    let listed: Vec<(Uuid, i64)> = service
        .list_steps(sub_task.id)
        .unwrap()
        .iter()
        .map(|step| (step.id, step.order))
        .collect();
    assert_eq!(
        listed,
        vec![(steps[2].id, 0), (steps[3].id, 1), (steps[0].id, 2)]
    );
}

#[test]
fn indices_address_completion_partitioned_view() {
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
    service.toggle_step(steps[0].id).unwrap();

    let view: Vec<Uuid> = service
        .list_steps(sub_task.id)
        .unwrap()
        .iter()
        .map(|step| step.id)
        .collect();
    assert_eq!(view, vec![steps[1].id, steps[2].id, steps[0].id]);

    service
        .reorder(ReorderRequest::within(
            SiblingGroup::Steps { task: sub_task.id },
            0,
            1,
        ))
        .unwrap();
    let listed: Vec<(Uuid, i64)> = service
        .list_steps(sub_task.id)
        .unwrap()
        .iter()
        .map(|step| (step.id, step.order))
        .collect();
    assert_eq!(
        listed,
        vec![(steps[2].id, 0), (steps[1].id, 1), (steps[0].id, 2)]
    );
}

#[test]
fn single_member_group_and_same_index_are_noops() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let only = service.create_sub_task(project.id, "Only", "").unwrap();
    let group = SiblingGroup::Tasks {
        parent: Some(project.id),
    };
    let before = service.get_task(only.id).unwrap().unwrap();

    assert_eq!(
        service
            .reorder(ReorderRequest::within(group, 0, 0))
            .unwrap(),
        Outcome::Unchanged
    );
    assert_eq!(
        service
            .reorder(ReorderRequest::within(group, 0, 3))
            .unwrap(),
        Outcome::Unchanged
    );
    assert_eq!(service.get_task(only.id).unwrap().unwrap(), before);

    service.create_sub_task(project.id, "Second", "").unwrap();
    assert_eq!(
        service
            .reorder(ReorderRequest::within(group, 1, 1))
            .unwrap(),
        Outcome::Unchanged
    );
}

#[test]
fn cross_group_move_is_rejected_without_mutation() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    let left = service.create_sub_task(project.id, "Left", "").unwrap();
    let right = service.create_sub_task(project.id, "Right", "").unwrap();
    service.add_step(left.id, "a").unwrap();
    service.add_step(left.id, "b").unwrap();
    let before = service.list_steps(left.id).unwrap();

    let err = service
        .reorder(ReorderRequest {
            source: SiblingGroup::Steps { task: left.id },
            target: SiblingGroup::Steps { task: right.id },
            start_index: 0,
            end_index: 1,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert!(matches!(
        err,
        ServiceError::Invariant(InvariantViolation::CrossGroupMove { .. })
    ));
    assert_eq!(service.list_steps(left.id).unwrap(), before);
}

#[test]
fn out_of_bounds_index_is_rejected() {
    let conn = setup();
    let service = service(&conn);
    let project = service
        .create_project("Launch", "", TaskCategory::Project)
        .unwrap();
    service.create_sub_task(project.id, "A", "").unwrap();
    service.create_sub_task(project.id, "B", "").unwrap();

    let err = service
        .reorder(ReorderRequest::within(
            SiblingGroup::Tasks {
                parent: Some(project.id),
            },
            0,
            2,
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Invariant(InvariantViolation::IndexOutOfBounds(IndexOutOfBounds {
            index: 2,
            len: 2
        }))
    ));
}

#[test]
fn reorder_under_missing_parent_is_a_noop() {
    let conn = setup();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    let outcome = service
        .reorder(ReorderRequest::within(
            SiblingGroup::Steps { task: missing },
            0,
            1,
        ))
        .unwrap();
    assert_eq!(outcome, Outcome::MissingTarget(EntityRef::task(missing)));
}

#[test]
fn top_level_reorder_updates_board_columns() {
    let conn = setup();
    let service = service(&conn);
    let [first, second, third] = ["One", "Two", "Three"]
        .map(|title| service.create_project(title, "", TaskCategory::Todo).unwrap());
    assert_eq!((first.order, second.order, third.order), (0, 1, 2));

    service
        .reorder(ReorderRequest::within(SiblingGroup::Tasks { parent: None }, 2, 0))
        .unwrap();

    let board = service.board().unwrap();
    let ids: Vec<Uuid> = board.todo.iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![third.id, first.id, second.id]);
    assert!(board.projects.is_empty());
    assert!(board.now.is_empty());
}

#[test]
fn append_after_delete_keeps_orders_unique_and_lands_last() {
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

    service.delete_step(steps[0].id).unwrap();
    let added = service.add_step(sub_task.id, "d").unwrap();
    assert_eq!(added.order, 3);

    let listed: Vec<(Uuid, i64)> = service
        .list_steps(sub_task.id)
        .unwrap()
        .iter()
        .map(|step| (step.id, step.order))
        .collect();
    assert_eq!(
        listed,
        vec![(steps[1].id, 1), (steps[2].id, 2), (added.id, 3)]
    );

    let first = service.create_sub_task(project.id, "First", "").unwrap();
    service.create_sub_task(project.id, "Second", "").unwrap();
    service.delete_task(first.id).unwrap();
    let third = service.create_sub_task(project.id, "Third", "").unwrap();
    let orders: Vec<i64> = sub_task_orders(&service, project.id)
        .into_iter()
        .map(|(_, order)| order)
        .collect();
    assert_eq!(orders, vec![0, 2, 3]);
    assert_eq!(sub_task_orders(&service, project.id)[2].0, third.id);
}
