//! Local-storage backend: four JSON-serialized entries under fixed keys,
//! kept in a single JSON object file.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{Backend, BackendKind, PersistenceError};
use crate::models::{CompletedTask, Project, Settings, SettingsPatch, Task};

const SETTINGS_KEY: &str = "pomovate_settings";
const TASKS_KEY: &str = "pomovate_tasks";
const COMPLETED_TASKS_KEY: &str = "pomovate_completed_tasks";
const PROJECTS_KEY: &str = "pomovate_projects";

pub struct LocalStorageBackend {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    entries: RefCell<BTreeMap<String, String>>,
}

impl LocalStorageBackend {
    /// Loads the store from `path`, starting empty if the file doesn't exist.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "unreadable local storage, starting fresh");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: RefCell::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, PersistenceError> {
        match self.entries.borrow().get(key) {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(T::default()),
        }
    }

    /// Replaces several entries and flushes them in one file write.
    fn write(&self, updates: Vec<(&str, String)>) -> Result<(), PersistenceError> {
        {
            let mut entries = self.entries.borrow_mut();
            for (key, value) in updates {
                entries.insert(key.to_string(), value);
            }
        }
        self.flush()
    }

    fn write_one<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        self.write(vec![(key, serde_json::to_string(value)?)])
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|_| PersistenceError::DirectoryCreation(parent.to_path_buf()))?;
        }

        // Write to a sibling file and rename over the original.
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(&*self.entries.borrow())?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

impl Backend for LocalStorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get_settings(&self) -> Result<Settings, PersistenceError> {
        self.read(SETTINGS_KEY)
    }

    fn update_settings(&self, patch: &SettingsPatch) -> Result<(), PersistenceError> {
        let mut settings = self.get_settings()?;
        settings.apply(patch);
        self.write_one(SETTINGS_KEY, &settings)
    }

    fn get_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        self.read(TASKS_KEY)
    }

    fn add_task(&self, task: &Task) -> Result<(), PersistenceError> {
        let mut tasks = self.get_tasks()?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(PersistenceError::Corrupt(format!("duplicate task id {}", task.id)));
        }
        tasks.push(task.clone());
        self.write_one(TASKS_KEY, &tasks)
    }

    fn update_task(&self, task: &Task) -> Result<(), PersistenceError> {
        let mut tasks = self.get_tasks()?;
        if let Some(stored) = tasks.iter_mut().find(|t| t.id == task.id) {
            *stored = task.clone();
            self.write_one(TASKS_KEY, &tasks)?;
        }
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<(), PersistenceError> {
        let mut tasks = self.get_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() != before {
            self.write_one(TASKS_KEY, &tasks)?;
        }
        Ok(())
    }

    fn complete_task(
        &self,
        id: &str,
        completed_pomodoros: Option<f64>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut tasks = self.get_tasks()?;
        let Some(index) = tasks.iter().position(|t| t.id == id) else {
            return Ok(());
        };

        let task = tasks.remove(index);
        let count = completed_pomodoros.unwrap_or(task.completed_pomodoros as f64);
        let mut completed: Vec<CompletedTask> = self.read(COMPLETED_TASKS_KEY)?;
        completed.retain(|t| t.id != id);
        completed.push(CompletedTask::from_task(task, count, completed_at));

        self.write(vec![
            (TASKS_KEY, serde_json::to_string(&tasks)?),
            (COMPLETED_TASKS_KEY, serde_json::to_string(&completed)?),
        ])
    }

    fn get_projects(&self) -> Result<Vec<String>, PersistenceError> {
        let projects: Vec<Project> = self.read(PROJECTS_KEY)?;
        Ok(projects.into_iter().map(|p| p.name).collect())
    }

    fn add_project(&self, name: &str) -> Result<(), PersistenceError> {
        let mut projects: Vec<Project> = self.read(PROJECTS_KEY)?;
        if projects.iter().any(|p| p.name == name) {
            return Ok(());
        }
        projects.push(Project {
            name: name.to_string(),
            created_at: Utc::now(),
        });
        self.write_one(PROJECTS_KEY, &projects)
    }

    fn get_completed_tasks(&self) -> Result<Vec<CompletedTask>, PersistenceError> {
        let mut completed: Vec<CompletedTask> = self.read(COMPLETED_TASKS_KEY)?;
        // Later insertions win ties.
        completed.reverse();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(completed)
    }
}
