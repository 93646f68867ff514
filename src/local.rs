use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Local persisted storage: whole-collection JSON blobs keyed per
/// collection, in a SQLite file inside the workspace directory. Writes are
/// full overwrites, never incremental.
pub struct LocalStore {
    conn: Connection,
}

pub const KEY_STUDENTS: &str = "students";
pub const KEY_CLASSES: &str = "classes";
pub const KEY_POINTS: &str = "points";
pub const KEY_ATTENDANCE: &str = "attendance";

impl LocalStore {
    pub fn open(workspace: &Path) -> anyhow::Result<LocalStore> {
        std::fs::create_dir_all(workspace)?;
        let db_path = workspace.join("classpoints.sqlite3");
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_blobs(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(LocalStore { conn })
    }

    pub fn get_json(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv_blobs WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn set_json(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO kv_blobs(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, serde_json::to_string(value)?),
        )?;
        Ok(())
    }
}
