use rusqlite::Connection;

use crate::error::EngineError;

/// Run the consolidated schema migration. Idempotent; safe on every startup.
pub fn run(conn: &Connection) -> Result<(), EngineError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Illustration tasks
-- ============================================================================

CREATE TABLE IF NOT EXISTS illustration_tasks (
    id                          TEXT PRIMARY KEY,
    page_id                     TEXT NOT NULL,
    story_id                    TEXT NOT NULL,
    priority                    TEXT NOT NULL DEFAULT 'medium'
        CHECK(priority IN ('low', 'medium', 'high', 'critical')),
    status                      TEXT NOT NULL DEFAULT 'pending'
        CHECK(status IN ('pending', 'scheduled', 'generating', 'ready', 'failed')),
    page_number                 INTEGER NOT NULL,
    total_pages                 INTEGER NOT NULL,
    description                 TEXT NOT NULL,
    previous_illustration_path  TEXT,
    output_path                 TEXT,
    error_message               TEXT,
    attempts                    INTEGER NOT NULL DEFAULT 0,
    created_at                  TEXT NOT NULL,
    updated_at                  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_page_id  ON illustration_tasks(page_id);
CREATE INDEX IF NOT EXISTS idx_tasks_story_id ON illustration_tasks(story_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status   ON illustration_tasks(status);

"#;
