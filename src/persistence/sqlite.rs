//! SQLite backend.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::{format_timestamp, parse_timestamp, Backend, BackendKind, PersistenceError};
use crate::models::{CompletedTask, Priority, Settings, SettingsPatch, Task};

pub struct SqliteBackend {
    conn: Connection,
}

/// Raw column values shared by `tasks` and `completed_tasks`.
type TaskRow = (String, String, String, u32, f64, String, Option<String>);

impl SqliteBackend {
    /// Opens (or creates) the database at `path`, initializing tables if needed.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| PersistenceError::DirectoryCreation(parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), PersistenceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                estimated_pomodoros INTEGER NOT NULL,
                completed_pomodoros INTEGER NOT NULL DEFAULT 0,
                priority TEXT NOT NULL,
                project TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(project) REFERENCES projects(name)
            );

            CREATE TABLE IF NOT EXISTS completed_tasks (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                estimated_pomodoros INTEGER NOT NULL,
                completed_pomodoros REAL NOT NULL,
                priority TEXT NOT NULL,
                project TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    fn read_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn task_from_row(raw: TaskRow) -> Result<Task, PersistenceError> {
        let (id, description, created_at, estimated, completed, priority, project) = raw;
        Ok(Task {
            id,
            description,
            created_at: parse_timestamp(&created_at)?,
            estimated_pomodoros: estimated,
            completed_pomodoros: completed as u32,
            priority: parse_priority(&priority)?,
            project,
        })
    }
}

fn parse_priority(raw: &str) -> Result<Priority, PersistenceError> {
    raw.parse::<Priority>().map_err(PersistenceError::Corrupt)
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn get_settings(&self) -> Result<Settings, PersistenceError> {
        let mut merged = match serde_json::to_value(Settings::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            merged.insert(key, serde_json::from_str(&value)?);
        }

        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    fn update_settings(&self, patch: &SettingsPatch) -> Result<(), PersistenceError> {
        let Value::Object(fields) = serde_json::to_value(patch)? else {
            return Ok(());
        };

        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in fields {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                params![key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, description, created_at, estimated_pomodoros, completed_pomodoros,
                    priority, project
             FROM tasks ORDER BY rowid",
        )?;
        let tasks = stmt
            .query_map([], Self::read_task_row)?
            .map(|raw| Self::task_from_row(raw?))
            .collect::<Result<Vec<_>, PersistenceError>>()?;
        Ok(tasks)
    }

    fn add_task(&self, task: &Task) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO tasks (id, description, estimated_pomodoros, completed_pomodoros,
                                priority, project, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                task.id,
                task.description,
                task.estimated_pomodoros,
                task.completed_pomodoros,
                task.priority.as_str(),
                task.project,
                format_timestamp(&task.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<(), PersistenceError> {
        self.conn.execute(
            "UPDATE tasks SET description = ?, estimated_pomodoros = ?, completed_pomodoros = ?,
                              priority = ?, project = ?
             WHERE id = ?",
            params![
                task.description,
                task.estimated_pomodoros,
                task.completed_pomodoros,
                task.priority.as_str(),
                task.project,
                task.id,
            ],
        )?;
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<(), PersistenceError> {
        self.conn.execute("DELETE FROM tasks WHERE id = ?", [id])?;
        Ok(())
    }

    fn complete_task(
        &self,
        id: &str,
        completed_pomodoros: Option<f64>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.unchecked_transaction()?;

        let stored: Option<f64> = tx
            .query_row(
                "SELECT completed_pomodoros FROM tasks WHERE id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(stored) = stored {
            tx.execute(
                "INSERT OR REPLACE INTO completed_tasks
                     (id, description, estimated_pomodoros, completed_pomodoros,
                      priority, project, created_at, completed_at)
                 SELECT id, description, estimated_pomodoros, ?, priority, project, created_at, ?
                 FROM tasks WHERE id = ?",
                params![
                    completed_pomodoros.unwrap_or(stored),
                    format_timestamp(&completed_at),
                    id
                ],
            )?;
            tx.execute("DELETE FROM tasks WHERE id = ?", [id])?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_projects(&self) -> Result<Vec<String>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM projects ORDER BY created_at, rowid")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn add_project(&self, name: &str) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO projects (name, created_at) VALUES (?, ?)",
            params![name, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    fn get_completed_tasks(&self) -> Result<Vec<CompletedTask>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, description, created_at, estimated_pomodoros, completed_pomodoros,
                    priority, project, completed_at
             FROM completed_tasks ORDER BY completed_at DESC, rowid DESC",
        )?;
        let completed = stmt
            .query_map([], |row| Ok((Self::read_task_row(row)?, row.get::<_, String>(7)?)))?
            .map(|row| -> Result<CompletedTask, PersistenceError> {
                let (raw, done_at) = row?;
                let task = Self::task_from_row(raw.clone())?;
                Ok(CompletedTask::from_task(task, raw.4, parse_timestamp(&done_at)?))
            })
            .collect::<Result<Vec<_>, PersistenceError>>()?;
        Ok(completed)
    }
}
