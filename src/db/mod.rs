pub mod migrations;
pub mod models;
pub mod repos;

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::EngineError;

pub type DbPool = Pool<SqliteConnectionManager>;

const DB_FILE_NAME: &str = "storybrush.db";

/// Applies per-connection pragmas on every checkout from the pool.
#[derive(Debug)]
struct SqlitePragmaCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for SqlitePragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
    }
}

/// Initialize the task database under `data_dir` and run migrations.
///
/// WAL mode is set once here; it persists in the database file. Per-
/// connection pragmas are reapplied by the pool customizer.
pub fn init_db(data_dir: &Path) -> Result<DbPool, EngineError> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(DB_FILE_NAME);

    tracing::info!(path = %db_path.display(), "Initializing task database");

    let manager = SqliteConnectionManager::file(&db_path);
    let pool = Pool::builder()
        .max_size(4)
        .connection_customizer(Box::new(SqlitePragmaCustomizer))
        .build(manager)?;

    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }

    let conn = pool.get()?;
    migrations::run(&conn)?;

    tracing::info!("Task database ready");
    Ok(pool)
}

/// Fresh file-backed database for tests. A unique temp file per call keeps
/// parallel tests isolated.
#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, EngineError> {
    use std::time::Duration;

    let db_path = std::env::temp_dir().join(format!("storybrush_test_{}.db", uuid::Uuid::new_v4()));

    let manager = SqliteConnectionManager::file(&db_path);
    let pool = Pool::builder()
        .max_size(2)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(SqlitePragmaCustomizer))
        .build(manager)?;

    let conn = pool.get()?;
    migrations::run(&conn)?;
    drop(conn);

    Ok(pool)
}
