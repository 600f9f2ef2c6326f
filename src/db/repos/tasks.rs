//! Durable task store: CRUD over persisted illustration tasks plus the
//! recovery scan the coordinator runs at startup.
//!
//! Lookups by unknown identifier return `None` rather than erroring;
//! tasks may legitimately be deleted while work referencing them is in
//! flight. Storage failures always propagate.

use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::PersistedIllustrationTask;
use crate::db::DbPool;
use crate::engine::types::{IllustrationTask, TaskStatus};
use crate::error::EngineError;

fn row_to_task(row: &Row) -> rusqlite::Result<PersistedIllustrationTask> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    Ok(PersistedIllustrationTask {
        id: row.get("id")?,
        page_id: row.get("page_id")?,
        story_id: row.get("story_id")?,
        priority: priority.parse().unwrap_or_default(),
        status: status.parse().unwrap_or(TaskStatus::Failed),
        page_number: row.get("page_number")?,
        total_pages: row.get("total_pages")?,
        description: row.get("description")?,
        previous_illustration_path: row.get("previous_illustration_path")?,
        output_path: row.get("output_path")?,
        error_message: row.get("error_message")?,
        attempts: row.get("attempts")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

// All read-modify-read sequences stay on one pooled connection.
fn fetch_by_id(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<PersistedIllustrationTask>> {
    conn.query_row(
        "SELECT * FROM illustration_tasks WHERE id = ?1",
        params![id],
        row_to_task,
    )
    .optional()
}

/// Create or overwrite the record for `task.id`.
///
/// Overwriting refreshes every descriptive field and the updated-at
/// timestamp but preserves the attempt count and creation timestamp;
/// attempts only change through `increment_attempt`/`reset_attempts`.
pub fn save(
    pool: &DbPool,
    task: &IllustrationTask,
    page_number: u32,
    total_pages: u32,
    description: &str,
    previous_illustration_path: Option<&str>,
) -> Result<PersistedIllustrationTask, EngineError> {
    let now = chrono::Utc::now().to_rfc3339();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO illustration_tasks
         (id, page_id, story_id, priority, status, page_number, total_pages,
          description, previous_illustration_path, attempts, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(id) DO UPDATE SET
            page_id = excluded.page_id,
            story_id = excluded.story_id,
            priority = excluded.priority,
            status = excluded.status,
            page_number = excluded.page_number,
            total_pages = excluded.total_pages,
            description = excluded.description,
            previous_illustration_path = excluded.previous_illustration_path,
            updated_at = excluded.updated_at",
        params![
            task.id,
            task.page_id,
            task.story_id,
            task.priority.as_str(),
            task.status.as_str(),
            page_number,
            total_pages,
            description,
            previous_illustration_path,
            task.attempts,
            now,
        ],
    )?;

    let record = conn.query_row(
        "SELECT * FROM illustration_tasks WHERE id = ?1",
        params![task.id],
        row_to_task,
    )?;
    Ok(record)
}

pub fn get(pool: &DbPool, id: &str) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    Ok(fetch_by_id(&conn, id)?)
}

pub fn get_by_page(
    pool: &DbPool,
    page_id: &str,
) -> Result<Vec<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM illustration_tasks WHERE page_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![page_id], row_to_task)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::Database)
}

pub fn get_by_story(
    pool: &DbPool,
    story_id: &str,
) -> Result<Vec<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM illustration_tasks WHERE story_id = ?1 ORDER BY page_number ASC, created_at ASC",
    )?;
    let rows = stmt.query_map(params![story_id], row_to_task)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::Database)
}

/// Transition a task's status, touching the updated-at timestamp.
///
/// Returns `None` for an unknown id. An illegal transition is an
/// `InvalidTransition` error; re-asserting the current status is an
/// idempotent touch. Moving back to `pending` clears the recorded error.
pub fn update_status(
    pool: &DbPool,
    id: &str,
    new_status: TaskStatus,
) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let Some(current) = fetch_by_id(&conn, id)? else {
        return Ok(None);
    };

    if current.status != new_status && !current.status.can_transition_to(new_status) {
        return Err(EngineError::InvalidTransition {
            from: current.status,
            to: new_status,
        });
    }

    let now = chrono::Utc::now().to_rfc3339();
    let clear_error = new_status == TaskStatus::Pending;
    conn.execute(
        "UPDATE illustration_tasks SET
            status = ?1,
            updated_at = ?2,
            error_message = CASE WHEN ?3 THEN NULL ELSE error_message END
         WHERE id = ?4",
        params![new_status.as_str(), now, clear_error, id],
    )?;

    Ok(fetch_by_id(&conn, id)?)
}

/// Record a successful generation: `generating -> ready` plus the output
/// location. Returns `None` for an unknown id.
pub fn mark_ready(
    pool: &DbPool,
    id: &str,
    output_path: &str,
) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let Some(current) = fetch_by_id(&conn, id)? else {
        return Ok(None);
    };

    if !current.status.can_transition_to(TaskStatus::Ready) {
        return Err(EngineError::InvalidTransition {
            from: current.status,
            to: TaskStatus::Ready,
        });
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE illustration_tasks SET
            status = 'ready',
            output_path = ?1,
            error_message = NULL,
            updated_at = ?2
         WHERE id = ?3",
        params![output_path, now, id],
    )?;

    Ok(fetch_by_id(&conn, id)?)
}

/// Record a failed generation: status to `failed` with the error text.
/// Returns `None` for an unknown id.
pub fn mark_failed(
    pool: &DbPool,
    id: &str,
    error_message: &str,
) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let Some(current) = fetch_by_id(&conn, id)? else {
        return Ok(None);
    };

    if current.status != TaskStatus::Failed
        && !current.status.can_transition_to(TaskStatus::Failed)
    {
        return Err(EngineError::InvalidTransition {
            from: current.status,
            to: TaskStatus::Failed,
        });
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE illustration_tasks SET
            status = 'failed',
            error_message = ?1,
            updated_at = ?2
         WHERE id = ?3",
        params![error_message, now, id],
    )?;

    Ok(fetch_by_id(&conn, id)?)
}

/// Increment the attempt counter by exactly 1.
pub fn increment_attempt(
    pool: &DbPool,
    id: &str,
) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE illustration_tasks SET attempts = attempts + 1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    Ok(fetch_by_id(&conn, id)?)
}

/// Zero the attempt counter, used by manual retry when configured to.
pub fn reset_attempts(
    pool: &DbPool,
    id: &str,
) -> Result<Option<PersistedIllustrationTask>, EngineError> {
    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE illustration_tasks SET attempts = 0, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    Ok(fetch_by_id(&conn, id)?)
}

/// Hard delete. Idempotent; returns whether a record was removed.
pub fn delete(pool: &DbPool, id: &str) -> Result<bool, EngineError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM illustration_tasks WHERE id = ?1",
        params![id],
    )?;
    Ok(rows > 0)
}

/// Delete every task for a page. Returns the number of removed records.
pub fn delete_for_page(pool: &DbPool, page_id: &str) -> Result<usize, EngineError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM illustration_tasks WHERE page_id = ?1",
        params![page_id],
    )?;
    Ok(rows)
}

/// Delete every task for a story. Returns the number of removed records.
pub fn delete_all_for_story(pool: &DbPool, story_id: &str) -> Result<usize, EngineError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM illustration_tasks WHERE story_id = ?1",
        params![story_id],
    )?;
    Ok(rows)
}

/// Every record not yet resolved: `pending`, `scheduled`, or `generating`.
/// This is the recovery surface the coordinator scans at startup.
pub fn all_pending(pool: &DbPool) -> Result<Vec<PersistedIllustrationTask>, EngineError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM illustration_tasks
         WHERE status IN ('pending', 'scheduled', 'generating')
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], row_to_task)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::Database)
}

/// Remove resolved records older than the retention window.
pub fn purge_resolved(pool: &DbPool, older_than_days: u32) -> Result<usize, EngineError> {
    let conn = pool.get()?;

    // Compute the cutoff with chrono so it compares in the same RFC3339
    // format the store writes.
    let cutoff =
        (chrono::Utc::now() - chrono::Duration::days(older_than_days as i64)).to_rfc3339();
    let rows = conn.execute(
        "DELETE FROM illustration_tasks
         WHERE status IN ('ready', 'failed')
           AND updated_at < ?1",
        params![cutoff],
    )?;
    Ok(rows)
}
