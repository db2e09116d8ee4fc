//! Storage backends for settings, tasks, completed tasks and projects.
//!
//! Two implementations satisfy the same [`Backend`] contract: an embedded
//! SQLite database and a local-storage style JSON file. One is chosen at
//! startup by [`open`]; nothing above this module branches on which.

mod local;
mod sqlite;

pub use local::LocalStorageBackend;
pub use sqlite::SqliteBackend;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{CompletedTask, Settings, SettingsPatch, Task};

pub const DATABASE_FILE: &str = "pomovate.db";
pub const LOCAL_STORAGE_FILE: &str = "pomovate.json";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to create data directory {0}")]
    DirectoryCreation(PathBuf),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// The storage contract shared by every backend.
///
/// Ids are generated by the caller, so `add_task` receives a complete task.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Returns stored settings, falling back to defaults for missing keys.
    fn get_settings(&self) -> Result<Settings, PersistenceError>;
    fn update_settings(&self, patch: &SettingsPatch) -> Result<(), PersistenceError>;

    /// Returns active tasks in insertion order.
    fn get_tasks(&self) -> Result<Vec<Task>, PersistenceError>;
    fn add_task(&self, task: &Task) -> Result<(), PersistenceError>;
    fn update_task(&self, task: &Task) -> Result<(), PersistenceError>;
    fn delete_task(&self, id: &str) -> Result<(), PersistenceError>;

    /// Atomically moves a task to the completed set. `completed_pomodoros`
    /// overrides the stored count. A missing id is not an error.
    fn complete_task(
        &self,
        id: &str,
        completed_pomodoros: Option<f64>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Returns project names in creation order.
    fn get_projects(&self) -> Result<Vec<String>, PersistenceError>;
    /// Inserts a project unless one with the same name exists.
    fn add_project(&self, name: &str) -> Result<(), PersistenceError>;

    /// Returns completed tasks, most recently completed first.
    fn get_completed_tasks(&self) -> Result<Vec<CompletedTask>, PersistenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Local => f.write_str("local"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" | "db" => Ok(Self::Sqlite),
            "local" | "json" | "localstorage" => Ok(Self::Local),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Opens the backend for `data_dir`.
///
/// An explicit `choice` is honored as-is. Otherwise an existing local-storage
/// file with no database next to it selects local storage, and SQLite is
/// tried first with local storage as the fallback.
pub fn open(
    data_dir: &Path,
    choice: Option<BackendKind>,
) -> Result<Box<dyn Backend>, PersistenceError> {
    std::fs::create_dir_all(data_dir)
        .map_err(|_| PersistenceError::DirectoryCreation(data_dir.to_path_buf()))?;

    let db_path = data_dir.join(DATABASE_FILE);
    let local_path = data_dir.join(LOCAL_STORAGE_FILE);

    let backend: Box<dyn Backend> = match choice.unwrap_or_else(|| detect(&db_path, &local_path)) {
        BackendKind::Local => Box::new(LocalStorageBackend::open(&local_path)?),
        BackendKind::Sqlite if choice.is_some() => Box::new(SqliteBackend::open(&db_path)?),
        BackendKind::Sqlite => match SqliteBackend::open(&db_path) {
            Ok(db) => Box::new(db),
            Err(e) => {
                warn!(error = %e, path = %db_path.display(), "SQLite unavailable, using local storage");
                Box::new(LocalStorageBackend::open(&local_path)?)
            }
        },
    };

    info!(backend = %backend.kind(), dir = %data_dir.display(), "storage opened");
    Ok(backend)
}

fn detect(db_path: &Path, local_path: &Path) -> BackendKind {
    if local_path.exists() && !db_path.exists() {
        BackendKind::Local
    } else {
        BackendKind::Sqlite
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("timestamp {raw:?}: {e}")))
}


/// A backend that starts empty and rejects every write.
#[cfg(test)]
pub(crate) struct RejectingBackend;

#[cfg(test)]
impl RejectingBackend {
    fn reject<T>(op: &str) -> Result<T, PersistenceError> {
        Err(PersistenceError::Corrupt(format!("{op} rejected")))
    }
}

#[cfg(test)]
impl Backend for RejectingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get_settings(&self) -> Result<Settings, PersistenceError> {
        Ok(Settings::default())
    }

    fn update_settings(&self, _patch: &SettingsPatch) -> Result<(), PersistenceError> {
        Self::reject("update_settings")
    }

    fn get_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        Ok(Vec::new())
    }

    fn add_task(&self, _task: &Task) -> Result<(), PersistenceError> {
        Self::reject("add_task")
    }

    fn update_task(&self, _task: &Task) -> Result<(), PersistenceError> {
        Self::reject("update_task")
    }

    fn delete_task(&self, _id: &str) -> Result<(), PersistenceError> {
        Self::reject("delete_task")
    }

    fn complete_task(
        &self,
        _id: &str,
        _completed_pomodoros: Option<f64>,
        _completed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        Self::reject("complete_task")
    }

    fn get_projects(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(Vec::new())
    }

    fn add_project(&self, _name: &str) -> Result<(), PersistenceError> {
        Self::reject("add_project")
    }

    fn get_completed_tasks(&self) -> Result<Vec<CompletedTask>, PersistenceError> {
        Ok(Vec::new())
    }
}
