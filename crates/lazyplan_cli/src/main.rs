//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `lazyplan_core` linkage.
//! - Print the board of the database at `LAZYPLAN_DB_PATH`.
//! - With `--demo`, run a small in-memory hierarchy through the services and
//!   print the aggregated progress instead.

use lazyplan_core::db::open_db_in_memory;
use lazyplan_core::{
    CoreConfig, ReorderRequest, SiblingGroup, SqliteEntityStore, TaskCategory, TaskService,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("lazyplan_core ping={}", lazyplan_core::ping());
    println!("lazyplan_core version={}", lazyplan_core::core_version());

    let config = CoreConfig::from_env();
    if let Err(err) = config.init_logging() {
        eprintln!("logging disabled: {err}");
    }

    let demo = std::env::args().skip(1).any(|arg| arg == "--demo");
    let result = if demo {
        run_demo()
    } else {
        show_board(&config)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lazyplan failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn show_board(config: &CoreConfig) -> Result<(), Box<dyn Error>> {
    let conn = config.open_db()?;
    let service = TaskService::new(SqliteEntityStore::try_new(&conn)?);
    let board = service.board()?;

    println!("db={}", config.db_path.display());
    for category in [TaskCategory::Project, TaskCategory::Now, TaskCategory::Todo] {
        let column = board.column(category);
        println!("{category:?} ({})", column.len());
        for task in column {
            println!(
                "  [{}] {} {}% {:?}",
                task.order, task.title, task.progress_percent, task.status
            );
        }
    }

    info!(
        "event=cli_board module=cli status=ok tasks={}",
        board.projects.len() + board.now.len() + board.todo.len()
    );
    Ok(())
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let service = TaskService::new(SqliteEntityStore::try_new(&conn)?);

    let project = service.create_project("Launch", "First public release", TaskCategory::Project)?;
    let docs = service.create_sub_task(project.id, "Write docs", "")?;
    let binary = service.create_sub_task(project.id, "Ship binary", "")?;

    for title in ["Outline", "Draft"] {
        let step = service.add_step(docs.id, title)?;
        service.toggle_step(step.id)?;
    }
    for title in ["Build", "Sign", "Upload", "Announce"] {
        service.add_step(binary.id, title)?;
    }
    service.reorder(ReorderRequest::within(
        SiblingGroup::Tasks {
            parent: Some(project.id),
        },
        1,
        0,
    ))?;

    let project = service
        .get_task(project.id)?
        .ok_or("demo project vanished")?;
    println!("{} {}%", project.title, project.progress_percent);
    for sub_task in service.list_sub_tasks(project.id)? {
        println!(
            "  [{}] {} {}% {:?}",
            sub_task.order, sub_task.title, sub_task.progress_percent, sub_task.status
        );
    }

    info!(
        "event=cli_demo module=cli status=ok project_progress={}",
        project.progress_percent
    );
    Ok(())
}
