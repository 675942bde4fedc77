//! Entity store contract and SQLite implementation.
//!
//! # Responsibility
//! - Load a consistent snapshot of every entity kind.
//! - Apply mutation batches atomically.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `apply_batch` is all-or-nothing: any failed statement rolls back the batch.
//! - Batches are validated before a transaction is opened.
//! - Updates/deletes that match no row abort the batch (stale snapshot).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{latest_version, schema_tables};
use crate::db::DbError;
use crate::engine::snapshot::Snapshot;
use crate::model::concern::{Concern, ConcernStatus};
use crate::model::entity::{EntityKind, EntityRef, Record};
use crate::model::log_entry::{now_epoch_ms, LogEntry};
use crate::model::memo::Memo;
use crate::model::step::{Step, StepStatus};
use crate::model::task::{Task, TaskCategory, TaskStatus};
use crate::model::validation::ModelValidationError;
use crate::repo::mutation::{FieldUpdate, Mutation, MutationBatch, MutationError, MutationOp};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by entity store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Batch rejected by validation or by the stored state.
    Mutation(MutationError),
    /// Persisted row failed model validation.
    Validation(ModelValidationError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Mutation(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "invalid persisted record: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity store requires table `{table}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Mutation(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<MutationError> for StoreError {
    fn from(value: MutationError) -> Self {
        Self::Mutation(value)
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Read-snapshot / atomic-batch persistence contract.
pub trait EntityStore {
    /// Loads every record of every kind as one consistent snapshot.
    fn load_snapshot(&self) -> StoreResult<Snapshot>;
    /// Applies `batch` completely or not at all.
    fn apply_batch(&self, batch: &MutationBatch) -> StoreResult<()>;
}

/// SQLite-backed entity store.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn load_snapshot(&self) -> StoreResult<Snapshot> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let mut logs = load_log_entries(&tx)?;

        let mut tasks = load_rows(&tx, TASK_SELECT_SQL, parse_task_row)?;
        for task in &mut tasks {
            task.progress_log = logs
                .remove(&(EntityKind::Task, task.id))
                .unwrap_or_default();
        }
        let steps = load_rows(&tx, STEP_SELECT_SQL, parse_step_row)?;
        let memos = load_rows(&tx, MEMO_SELECT_SQL, parse_memo_row)?;
        let mut concerns = load_rows(&tx, CONCERN_SELECT_SQL, parse_concern_row)?;
        for concern in &mut concerns {
            concern.analysis_log = logs
                .remove(&(EntityKind::Concern, concern.id))
                .unwrap_or_default();
        }
        tx.commit()?;

        debug!(
            "event=snapshot_load module=repo status=ok tasks={} steps={} memos={} concerns={}",
            tasks.len(),
            steps.len(),
            memos.len(),
            concerns.len()
        );
        Ok(Snapshot::from_records(tasks, steps, memos, concerns))
    }

    fn apply_batch(&self, batch: &MutationBatch) -> StoreResult<()> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let now = now_epoch_ms();
        for mutation in batch {
            if let Err(err) = apply_mutation(&tx, mutation, now) {
                warn!(
                    "event=batch_apply module=repo status=error mutations={} target={} error={}",
                    batch.len(),
                    mutation.target,
                    err
                );
                return Err(err);
            }
        }
        tx.commit()?;

        debug!(
            "event=batch_apply module=repo status=ok mutations={} duration_ms={}",
            batch.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    parent_uuid,
    related_concern_uuid,
    title,
    description,
    category,
    status,
    progress_percent,
    sort_order,
    created_at,
    updated_at
FROM tasks
ORDER BY uuid ASC;";

const STEP_SELECT_SQL: &str = "SELECT
    uuid,
    task_uuid,
    title,
    status,
    sort_order
FROM steps
ORDER BY uuid ASC;";

const MEMO_SELECT_SQL: &str = "SELECT
    uuid,
    step_uuid,
    content,
    timestamp_ms
FROM memos
ORDER BY uuid ASC;";

const CONCERN_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    resolution_action,
    status,
    created_at,
    updated_at
FROM concerns
ORDER BY uuid ASC;";

fn load_rows<T>(
    conn: &Connection,
    sql: &str,
    parse: fn(&Row<'_>) -> StoreResult<T>,
) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

fn load_log_entries(conn: &Connection) -> StoreResult<HashMap<(EntityKind, Uuid), Vec<LogEntry>>> {
    let mut stmt = conn.prepare(
        "SELECT owner_kind, owner_uuid, recorded_at, body
         FROM log_entries
         ORDER BY owner_kind ASC, owner_uuid ASC, seq ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut logs: HashMap<(EntityKind, Uuid), Vec<LogEntry>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get("owner_kind")?;
        let kind = match kind_text.as_str() {
            "task" => EntityKind::Task,
            "concern" => EntityKind::Concern,
            other => {
                return Err(StoreError::InvalidData(format!(
                    "invalid owner kind `{other}` in log_entries.owner_kind"
                )));
            }
        };
        let owner_text: String = row.get("owner_uuid")?;
        let owner = parse_uuid(&owner_text, "log_entries.owner_uuid")?;
        logs.entry((kind, owner)).or_default().push(LogEntry {
            timestamp_ms: row.get("recorded_at")?,
            text: row.get("body")?,
        });
    }
    Ok(logs)
}

fn apply_mutation(conn: &Connection, mutation: &Mutation, now: i64) -> StoreResult<()> {
    let target = mutation.target;
    match &mutation.op {
        MutationOp::Insert(record) => insert_record(conn, record),
        MutationOp::Update(updates) => {
            ensure_row_exists(conn, target)?;
            for update in updates {
                apply_field_update(conn, target, update)?;
            }
            if has_updated_at(target.kind) {
                conn.execute(
                    &format!(
                        "UPDATE {} SET updated_at = ?2 WHERE uuid = ?1;",
                        table_name(target.kind)
                    ),
                    params![target.id.to_string(), now],
                )?;
            }
            Ok(())
        }
        MutationOp::Delete => {
            if let Some(owner_kind) = log_owner_kind(target.kind) {
                conn.execute(
                    "DELETE FROM log_entries WHERE owner_kind = ?1 AND owner_uuid = ?2;",
                    params![owner_kind, target.id.to_string()],
                )?;
            }
            let changed = conn.execute(
                &format!("DELETE FROM {} WHERE uuid = ?1;", table_name(target.kind)),
                [target.id.to_string()],
            )?;
            if changed == 0 {
                return Err(MutationError::MissingTarget(target).into());
            }
            Ok(())
        }
    }
}

fn insert_record(conn: &Connection, record: &Record) -> StoreResult<()> {
    if row_exists(conn, record.entity_ref())? {
        return Err(MutationError::DuplicateTarget(record.entity_ref()).into());
    }
    match record {
        Record::Task(task) => {
            conn.execute(
                "INSERT INTO tasks (
                    uuid,
                    parent_uuid,
                    related_concern_uuid,
                    title,
                    description,
                    category,
                    status,
                    progress_percent,
                    sort_order,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    task.id.to_string(),
                    task.parent_task_id.map(|id| id.to_string()),
                    task.related_concern_id.map(|id| id.to_string()),
                    task.title.as_str(),
                    task.description.as_str(),
                    task_category_to_db(task.category),
                    task_status_to_db(task.status),
                    i64::from(task.progress_percent),
                    task.order,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            for entry in &task.progress_log {
                append_log_entry(conn, EntityKind::Task, task.id, entry)?;
            }
        }
        Record::Step(step) => {
            conn.execute(
                "INSERT INTO steps (uuid, task_uuid, title, status, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    step.id.to_string(),
                    step.parent_task_id.to_string(),
                    step.title.as_str(),
                    step_status_to_db(step.status),
                    step.order,
                ],
            )?;
        }
        Record::Memo(memo) => {
            conn.execute(
                "INSERT INTO memos (uuid, step_uuid, content, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    memo.id.to_string(),
                    memo.parent_step_id.to_string(),
                    memo.content.as_str(),
                    memo.timestamp_ms,
                ],
            )?;
        }
        Record::Concern(concern) => {
            conn.execute(
                "INSERT INTO concerns (
                    uuid,
                    title,
                    description,
                    resolution_action,
                    status,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    concern.id.to_string(),
                    concern.title.as_str(),
                    concern.description.as_str(),
                    concern.resolution_action.as_str(),
                    concern_status_to_db(concern.status),
                    concern.created_at,
                    concern.updated_at,
                ],
            )?;
            for entry in &concern.analysis_log {
                append_log_entry(conn, EntityKind::Concern, concern.id, entry)?;
            }
        }
    }
    Ok(())
}

fn apply_field_update(conn: &Connection, target: EntityRef, update: &FieldUpdate) -> StoreResult<()> {
    let (column, value) = match update {
        FieldUpdate::AppendProgressLog(entry) | FieldUpdate::AppendAnalysisLog(entry) => {
            return append_log_entry(conn, target.kind, target.id, entry);
        }
        FieldUpdate::Title(value) => ("title", Value::Text(value.clone())),
        FieldUpdate::Description(value) => ("description", Value::Text(value.clone())),
        FieldUpdate::Category(value) => (
            "category",
            Value::Text(task_category_to_db(*value).to_string()),
        ),
        FieldUpdate::TaskStatus(value) => {
            ("status", Value::Text(task_status_to_db(*value).to_string()))
        }
        FieldUpdate::ProgressPercent(value) => {
            ("progress_percent", Value::Integer(i64::from(*value)))
        }
        FieldUpdate::Order(value) => ("sort_order", Value::Integer(*value)),
        FieldUpdate::RelatedConcern(value) => (
            "related_concern_uuid",
            value.map_or(Value::Null, |id| Value::Text(id.to_string())),
        ),
        FieldUpdate::StepStatus(value) => {
            ("status", Value::Text(step_status_to_db(*value).to_string()))
        }
        FieldUpdate::Content(value) => ("content", Value::Text(value.clone())),
        FieldUpdate::Timestamp(value) => ("timestamp_ms", Value::Integer(*value)),
        FieldUpdate::ResolutionAction(value) => ("resolution_action", Value::Text(value.clone())),
        FieldUpdate::ConcernStatus(value) => (
            "status",
            Value::Text(concern_status_to_db(*value).to_string()),
        ),
    };

    let changed = conn.execute(
        &format!(
            "UPDATE {} SET {column} = ?2 WHERE uuid = ?1;",
            table_name(target.kind)
        ),
        params![target.id.to_string(), value],
    )?;
    if changed == 0 {
        return Err(MutationError::MissingTarget(target).into());
    }
    Ok(())
}

fn append_log_entry(
    conn: &Connection,
    owner_kind: EntityKind,
    owner_id: Uuid,
    entry: &LogEntry,
) -> StoreResult<()> {
    let Some(kind_text) = log_owner_kind(owner_kind) else {
        return Err(MutationError::FieldNotApplicable {
            field: "log",
            kind: owner_kind,
        }
        .into());
    };
    conn.execute(
        "INSERT INTO log_entries (owner_kind, owner_uuid, seq, recorded_at, body)
         VALUES (
            ?1,
            ?2,
            (SELECT COALESCE(MAX(seq), -1) + 1
             FROM log_entries
             WHERE owner_kind = ?1 AND owner_uuid = ?2),
            ?3,
            ?4
         );",
        params![
            kind_text,
            owner_id.to_string(),
            entry.timestamp_ms,
            entry.text.as_str()
        ],
    )?;
    Ok(())
}

fn ensure_row_exists(conn: &Connection, target: EntityRef) -> StoreResult<()> {
    if row_exists(conn, target)? {
        Ok(())
    } else {
        Err(MutationError::MissingTarget(target).into())
    }
}

fn row_exists(conn: &Connection, target: EntityRef) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE uuid = ?1);",
            table_name(target.kind)
        ),
        [target.id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Task => "tasks",
        EntityKind::Step => "steps",
        EntityKind::Memo => "memos",
        EntityKind::Concern => "concerns",
    }
}

fn has_updated_at(kind: EntityKind) -> bool {
    match kind {
        EntityKind::Task | EntityKind::Concern => true,
        EntityKind::Step | EntityKind::Memo => false,
    }
}

fn log_owner_kind(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Task => Some("task"),
        EntityKind::Concern => Some("concern"),
        EntityKind::Step | EntityKind::Memo => None,
    }
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let id_text: String = row.get("uuid")?;
    let category_text: String = row.get("category")?;
    let status_text: String = row.get("status")?;
    let progress: i64 = row.get("progress_percent")?;

    let task = Task {
        id: parse_uuid(&id_text, "tasks.uuid")?,
        parent_task_id: parse_optional_uuid(row.get("parent_uuid")?, "tasks.parent_uuid")?,
        related_concern_id: parse_optional_uuid(
            row.get("related_concern_uuid")?,
            "tasks.related_concern_uuid",
        )?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: parse_task_category(&category_text).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid task category `{category_text}` in tasks.category"
            ))
        })?,
        status: parse_task_status(&status_text).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
        })?,
        progress_percent: u8::try_from(progress).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid progress `{progress}` in tasks.progress_percent"
            ))
        })?,
        progress_log: Vec::new(),
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_step_row(row: &Row<'_>) -> StoreResult<Step> {
    let id_text: String = row.get("uuid")?;
    let task_text: String = row.get("task_uuid")?;
    let status_text: String = row.get("status")?;

    let step = Step {
        id: parse_uuid(&id_text, "steps.uuid")?,
        parent_task_id: parse_uuid(&task_text, "steps.task_uuid")?,
        title: row.get("title")?,
        status: parse_step_status(&status_text).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid step status `{status_text}` in steps.status"))
        })?,
        order: row.get("sort_order")?,
    };
    step.validate()?;
    Ok(step)
}

fn parse_memo_row(row: &Row<'_>) -> StoreResult<Memo> {
    let id_text: String = row.get("uuid")?;
    let step_text: String = row.get("step_uuid")?;

    let memo = Memo {
        id: parse_uuid(&id_text, "memos.uuid")?,
        parent_step_id: parse_uuid(&step_text, "memos.step_uuid")?,
        content: row.get("content")?,
        timestamp_ms: row.get("timestamp_ms")?,
    };
    memo.validate()?;
    Ok(memo)
}

fn parse_concern_row(row: &Row<'_>) -> StoreResult<Concern> {
    let id_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;

    let concern = Concern {
        id: parse_uuid(&id_text, "concerns.uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        resolution_action: row.get("resolution_action")?,
        status: parse_concern_status(&status_text).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid concern status `{status_text}` in concerns.status"
            ))
        })?,
        analysis_log: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    concern.validate()?;
    Ok(concern)
}

fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_optional_uuid(value: Option<String>, column: &'static str) -> StoreResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

fn task_category_to_db(category: TaskCategory) -> &'static str {
    match category {
        TaskCategory::Project => "project",
        TaskCategory::Now => "now",
        TaskCategory::Todo => "todo",
    }
}

fn parse_task_category(value: &str) -> Option<TaskCategory> {
    match value {
        "project" => Some(TaskCategory::Project),
        "now" => Some(TaskCategory::Now),
        "todo" => Some(TaskCategory::Todo),
        _ => None,
    }
}

fn task_status_to_db(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
    }
}

fn parse_task_status(value: &str) -> Option<TaskStatus> {
    match value {
        "pending" => Some(TaskStatus::Pending),
        "in_progress" => Some(TaskStatus::InProgress),
        "completed" => Some(TaskStatus::Completed),
        _ => None,
    }
}

fn step_status_to_db(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Completed => "completed",
    }
}

fn parse_step_status(value: &str) -> Option<StepStatus> {
    match value {
        "pending" => Some(StepStatus::Pending),
        "completed" => Some(StepStatus::Completed),
        _ => None,
    }
}

fn concern_status_to_db(status: ConcernStatus) -> &'static str {
    match status {
        ConcernStatus::Analyzing => "analyzing",
        ConcernStatus::SolutionDerived => "solution_derived",
        ConcernStatus::Resolved => "resolved",
    }
}

fn parse_concern_status(value: &str) -> Option<ConcernStatus> {
    match value {
        "analyzing" => Some(ConcernStatus::Analyzing),
        "solution_derived" => Some(ConcernStatus::SolutionDerived),
        "resolved" => Some(ConcernStatus::Resolved),
        _ => None,
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in schema_tables() {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
