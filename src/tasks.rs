//! Task store: the active task list, completed history and project tags.
//!
//! Every mutation is applied in memory first and then written through to the
//! backend. A failed write is logged and returned, but memory is not rolled
//! back, so the in-memory lists stay authoritative for the session.
//!
//! Operations on ids that no longer exist are silent no-ops. The timer may
//! report progress for a task the user deleted a moment earlier.

use std::rc::Rc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{CompletedTask, Priority, Task};
use crate::persistence::{Backend, PersistenceError};

/// Label used when grouping history for tasks without a project.
pub const NO_PROJECT: &str = "No Project";

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid task: {0}")]
    Validation(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub struct TaskStore {
    tasks: Vec<Task>,
    completed: Vec<CompletedTask>,
    projects: Vec<String>,
    active_task_id: Option<String>,
    backend: Rc<dyn Backend>,
}

impl TaskStore {
    /// Loads tasks, history and projects from `backend`.
    pub fn load(backend: Rc<dyn Backend>) -> Result<Self, PersistenceError> {
        let mut store = Self {
            tasks: Vec::new(),
            completed: Vec::new(),
            projects: Vec::new(),
            active_task_id: None,
            backend,
        };
        store.refresh()?;
        Ok(store)
    }

    /// Re-reads everything from the backend. The active binding is kept.
    pub fn refresh(&mut self) -> Result<(), PersistenceError> {
        self.tasks = self.backend.get_tasks()?;
        self.completed = self.backend.get_completed_tasks()?;
        self.projects = self.backend.get_projects()?;
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Completed tasks, most recent first.
    pub fn completed_tasks(&self) -> &[CompletedTask] {
        &self.completed
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn active_task_id(&self) -> Option<&str> {
        self.active_task_id.as_deref()
    }

    /// The bound task, if it is still in the active list.
    pub fn active_task(&self) -> Option<&Task> {
        self.active_task_id.as_deref().and_then(|id| self.get(id))
    }

    /// Rebinds the timer to `id`, or unbinds with `None`. The id is not checked.
    pub fn set_active_task(&mut self, id: Option<&str>) {
        debug!(task = ?id, "active task changed");
        self.active_task_id = id.map(str::to_string);
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, prefix: &str) -> Option<String> {
        if let Some(task) = self.get(prefix) {
            return Some(task.id.clone());
        }
        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) if !prefix.is_empty() => Some(task.id.clone()),
            _ => None,
        }
    }

    /// Creates a task with a fresh id and no completed pomodoros.
    ///
    /// A named project that doesn't exist yet is created as well.
    pub fn add_task(
        &mut self,
        description: &str,
        estimated_pomodoros: u32,
        priority: Priority,
        project: Option<&str>,
    ) -> Result<Task, TaskError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TaskError::Validation("description must not be empty".into()));
        }
        if estimated_pomodoros < 1 {
            return Err(TaskError::Validation(
                "estimated pomodoros must be at least 1".into(),
            ));
        }

        let project = project.map(str::trim).filter(|p| !p.is_empty());
        if let Some(name) = project {
            self.add_project(name)?;
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            estimated_pomodoros,
            completed_pomodoros: 0,
            priority,
            project: project.map(str::to_string),
        };
        self.tasks.push(task.clone());
        info!(id = %task.id, description = %task.description, "task added");

        self.backend.add_task(&task).inspect_err(|e| {
            error!(error = %e, id = %task.id, "failed to save new task");
        })?;
        Ok(task)
    }

    /// Records one completed pomodoro. Returns false if the task is gone.
    pub fn update_progress(&mut self, id: &str) -> Result<bool, PersistenceError> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "progress for missing task ignored");
            return Ok(false);
        };

        task.completed_pomodoros += 1;
        info!(id, completed = task.completed_pomodoros, "task progress");

        self.backend.update_task(task).inspect_err(|e| {
            error!(error = %e, id, "failed to save task progress");
        })?;
        Ok(true)
    }

    /// Removes a task, unbinding it if active. Deleting a missing id is fine.
    pub fn delete_task(&mut self, id: &str) -> Result<(), PersistenceError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.active_task_id.as_deref() == Some(id) {
            self.active_task_id = None;
        }
        if self.tasks.len() != before {
            info!(id, "task deleted");
        }

        self.backend.delete_task(id).inspect_err(|e| {
            error!(error = %e, id, "failed to delete task");
        })
    }

    /// Moves a task into the history, crediting `partial_progress` on top of
    /// its completed pomodoros. A missing id is a no-op returning `None`.
    pub fn complete_task(
        &mut self,
        id: &str,
        partial_progress: f64,
    ) -> Result<Option<CompletedTask>, PersistenceError> {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(id, "completion for missing task ignored");
            return Ok(None);
        };

        let task = self.tasks.remove(index);
        if self.active_task_id.as_deref() == Some(id) {
            self.active_task_id = None;
        }

        let count = task.completed_pomodoros as f64 + partial_progress.max(0.0);
        let done = CompletedTask::from_task(task, count, Utc::now());
        self.completed.insert(0, done.clone());
        info!(id, pomodoros = count, "task completed");

        self.backend
            .complete_task(id, Some(count), done.completed_at)
            .inspect_err(|e| {
                error!(error = %e, id, "failed to save completed task");
            })?;
        Ok(Some(done))
    }

    /// Adds a project unless the exact name already exists.
    pub fn add_project(&mut self, name: &str) -> Result<(), PersistenceError> {
        if name.is_empty() || self.projects.iter().any(|p| p == name) {
            return Ok(());
        }

        self.projects.push(name.to_string());
        info!(name, "project added");
        self.backend.add_project(name).inspect_err(|e| {
            error!(error = %e, name, "failed to save project");
        })
    }

    /// Completed tasks grouped by project, groups ordered by their most
    /// recent completion.
    pub fn history_by_project(&self) -> Vec<(&str, Vec<&CompletedTask>)> {
        let mut groups: Vec<(&str, Vec<&CompletedTask>)> = Vec::new();
        for task in &self.completed {
            let project = task.project.as_deref().unwrap_or(NO_PROJECT);
            match groups.iter_mut().find(|(name, _)| *name == project) {
                Some((_, tasks)) => tasks.push(task),
                None => groups.push((project, vec![task])),
            }
        }
        groups
    }
}
