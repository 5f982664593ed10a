use super::SnapshotBackend;
use crate::error::CrisisResult;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Snapshot records kept as rows of a single SQLite table
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    pub fn new(db_path: impl AsRef<Path>) -> CrisisResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;

        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshot_records (
                name TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            )",
            [],
        )?;

        log::info!("✅ SQLite snapshot store initialized with WAL mode");

        Ok(Self { conn })
    }
}

#[async_trait]
impl SnapshotBackend for SqliteSnapshotStore {
    async fn write_record(&mut self, name: &str, payload: &str) -> CrisisResult<()> {
        self.conn.execute(
            "INSERT INTO snapshot_records (name, payload, saved_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at",
            params![name, payload, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    async fn read_record(&mut self, name: &str) -> CrisisResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM snapshot_records WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
