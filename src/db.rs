use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::player::gate::StateStore;

/// Watch-progress checkpoint for one title. `episode_index` is 0 for movies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub episode_index: usize,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub updated_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS resume_points (
                content_id TEXT PRIMARY KEY,
                episode_index INTEGER NOT NULL,
                position_seconds REAL NOT NULL,
                duration_seconds REAL NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_resume_points_updated_at ON resume_points(updated_at DESC);
            CREATE TABLE IF NOT EXISTS favorites (
                content_id TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn upsert_resume(
        &self,
        content_id: &str,
        episode_index: usize,
        position_seconds: f64,
        duration_seconds: f64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO resume_points (content_id, episode_index, position_seconds, duration_seconds, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(content_id) DO UPDATE SET
                episode_index = excluded.episode_index,
                position_seconds = excluded.position_seconds,
                duration_seconds = excluded.duration_seconds,
                updated_at = excluded.updated_at
            "#,
            params![
                content_id,
                episode_index as i64,
                position_seconds,
                duration_seconds,
                now
            ],
        )?;
        Ok(())
    }

    pub fn resume_for(&self, content_id: &str) -> Result<Option<ResumePoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT episode_index, position_seconds, duration_seconds, updated_at
             FROM resume_points WHERE content_id = ?1",
        )?;
        let mut rows = stmt.query(params![content_id])?;
        if let Some(row) = rows.next()? {
            let episode_index: i64 = row.get(0)?;
            return Ok(Some(ResumePoint {
                episode_index: episode_index.max(0) as usize,
                position_seconds: row.get(1)?,
                duration_seconds: row.get(2)?,
                updated_at: row.get(3)?,
            }));
        }
        Ok(None)
    }

    /// Most recently updated resume point, for `aniryx resume`.
    pub fn latest_resume(&self) -> Result<Option<(String, ResumePoint)>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, episode_index, position_seconds, duration_seconds, updated_at
             FROM resume_points ORDER BY updated_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let content_id: String = row.get(0)?;
            let episode_index: i64 = row.get(1)?;
            return Ok(Some((
                content_id,
                ResumePoint {
                    episode_index: episode_index.max(0) as usize,
                    position_seconds: row.get(2)?,
                    duration_seconds: row.get(3)?,
                    updated_at: row.get(4)?,
                },
            )));
        }
        Ok(None)
    }

    pub fn list_resume(&self) -> Result<Vec<(String, ResumePoint)>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, episode_index, position_seconds, duration_seconds, updated_at
             FROM resume_points ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let episode_index: i64 = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                ResumePoint {
                    episode_index: episode_index.max(0) as usize,
                    position_seconds: row.get(2)?,
                    duration_seconds: row.get(3)?,
                    updated_at: row.get(4)?,
                },
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn is_favorite(&self, content_id: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT content_id FROM favorites WHERE content_id = ?1",
                params![content_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn set_favorite(&self, content_id: &str, favorite: bool) -> Result<()> {
        if favorite {
            let now = Utc::now().to_rfc3339();
            self.conn.execute(
                "INSERT OR IGNORE INTO favorites (content_id, added_at) VALUES (?1, ?2)",
                params![content_id, now],
            )?;
        } else {
            self.conn.execute(
                "DELETE FROM favorites WHERE content_id = ?1",
                params![content_id],
            )?;
        }
        Ok(())
    }

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO app_state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn clear_state(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM app_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl StateStore for Database {
    fn state_get(&self, key: &str) -> Result<Option<String>> {
        self.get_state(key)
    }

    fn state_set(&self, key: &str, value: &str) -> Result<()> {
        self.set_state(key, value)
    }
}
