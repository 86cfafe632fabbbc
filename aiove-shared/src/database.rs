//! Small persistent key/value store backed by SQLite. Values are JSON so any
//! serde type can be kept across runs.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::Stage;
use crate::wrappers::ffmpeg::VideoInfo;

pub const SCHEMA_VERSION_KEY: &str = "schema_version";
pub const RUNS_COMPLETED_KEY: &str = "runs_completed";

fn default_entries() -> Vec<(&'static str, Value)> {
    vec![(SCHEMA_VERSION_KEY, json!(1)), (RUNS_COMPLETED_KEY, json!(0))]
}

pub fn video_info_key(session: &str) -> String {
    format!("session.{}.video_info", session)
}

pub fn stage_key(session: &str) -> String {
    format!("session.{}.stage", session)
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file. A freshly created file gets the
    /// default entries.
    pub fn open(path: &Path) -> Result<Database> {
        let existed = path.exists();
        info!("Database file existed: [{}]", existed);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let database = Database {
            conn: Connection::open(path)?,
        };
        database.create_table()?;

        if !existed {
            warn!("Adding default entries to database file");
            for (key, value) in default_entries() {
                database.set(key, &value)?;
            }
        }

        for (key, value) in database.entries()? {
            debug!("[db] | {}: {}", key, value);
        }
        Ok(database)
    }

    /// An in-memory database, mostly useful for tests.
    pub fn in_memory() -> Result<Database> {
        let database = Database {
            conn: Connection::open_in_memory()?,
        };
        database.create_table()?;
        Ok(database)
    }

    fn create_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            params![],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, raw],
        )?;
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Every entry, sorted by key.
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt.query_map(params![], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            entries.push((key, serde_json::from_str(&raw)?));
        }
        Ok(entries)
    }

    pub fn record_video_info(&self, session: &str, info: &VideoInfo) -> Result<()> {
        self.set(&video_info_key(session), info)
    }

    pub fn record_stage(&self, session: &str, stage: Stage) -> Result<()> {
        debug!("Session [{}] reached stage [{}]", session, stage);
        self.set(&stage_key(session), &stage)
    }

    pub fn stage(&self, session: &str) -> Result<Stage> {
        Ok(self
            .get_as(&stage_key(session))?
            .unwrap_or(Stage::Uninitialized))
    }

    pub fn increment_runs_completed(&self) -> Result<u64> {
        let runs = self.get_as::<u64>(RUNS_COMPLETED_KEY)?.unwrap_or(0) + 1;
        self.set(RUNS_COMPLETED_KEY, &runs)?;
        Ok(runs)
    }
}
