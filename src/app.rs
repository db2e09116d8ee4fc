//! Main application state and logic.
//!
//! `App` owns the stores and the timer and is the only thing front ends
//! talk to. It is created once at startup and passed around by reference.

use std::rc::Rc;

use thiserror::Error;

use crate::models::{CompletedTask, Priority, SettingsPatch, Task, TimerMode};
use crate::persistence::{Backend, PersistenceError};
use crate::settings::SettingsStore;
use crate::tasks::{TaskError, TaskStore};
use crate::timer::{self, CompletionEvent, TimerEngine};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("No task matches '{0}'")]
    UnknownTask(String),
}

pub struct App {
    pub settings: SettingsStore,
    pub tasks: TaskStore,
    pub timer: TimerEngine,
}

impl App {
    /// Loads settings and tasks from `backend` and sets up a stopped pomodoro.
    pub fn new(backend: Rc<dyn Backend>) -> Result<Self, AppError> {
        let settings = SettingsStore::load(Rc::clone(&backend))?;
        let tasks = TaskStore::load(backend)?;
        let timer = TimerEngine::new(settings.get());

        Ok(Self {
            settings,
            tasks,
            timer,
        })
    }

    /// Advances the timer by one second.
    /// Returns (state_changed, optional_completion_event).
    pub fn tick(&mut self) -> (bool, Option<CompletionEvent>) {
        self.timer.tick(self.settings.get(), &mut self.tasks)
    }

    pub fn start(&mut self) {
        self.timer.start();
    }

    pub fn pause(&mut self) {
        self.timer.pause();
    }

    pub fn toggle(&mut self) {
        self.timer.toggle();
    }

    pub fn reset_timer(&mut self) {
        self.timer.reset(self.settings.get());
    }

    pub fn set_mode(&mut self, mode: TimerMode) {
        self.timer.set_mode(mode, self.settings.get());
    }

    pub fn add_task(
        &mut self,
        description: &str,
        estimated_pomodoros: u32,
        priority: Priority,
        project: Option<&str>,
    ) -> Result<Task, AppError> {
        Ok(self
            .tasks
            .add_task(description, estimated_pomodoros, priority, project)?)
    }

    /// Resolves a full id or unique prefix to a task id.
    pub fn resolve_task(&self, id: &str) -> Result<String, AppError> {
        self.tasks
            .resolve_id(id)
            .ok_or_else(|| AppError::UnknownTask(id.to_string()))
    }

    /// Binds the timer to a task.
    pub fn activate_task(&mut self, id: &str) -> Result<&Task, AppError> {
        let id = self.resolve_task(id)?;
        self.tasks.set_active_task(Some(&id));
        self.tasks
            .active_task()
            .ok_or(AppError::UnknownTask(id))
    }

    pub fn deactivate_task(&mut self) {
        self.tasks.set_active_task(None);
    }

    pub fn update_progress(&mut self, id: &str) -> Result<bool, AppError> {
        Ok(self.tasks.update_progress(id)?)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<(), AppError> {
        Ok(self.tasks.delete_task(id)?)
    }

    /// Completes a task. The active task is credited with the elapsed share
    /// of the running pomodoro and the timer is reset.
    pub fn complete_task(&mut self, id: &str) -> Result<Option<CompletedTask>, AppError> {
        if self.tasks.active_task_id() == Some(id) {
            return Ok(self
                .timer
                .complete_active_task_early(self.settings.get(), &mut self.tasks)?);
        }
        Ok(self.tasks.complete_task(id, 0.0)?)
    }

    /// Completes whichever task the timer is bound to.
    pub fn complete_active_task(&mut self) -> Result<Option<CompletedTask>, AppError> {
        Ok(self
            .timer
            .complete_active_task_early(self.settings.get(), &mut self.tasks)?)
    }

    pub fn add_project(&mut self, name: &str) -> Result<(), AppError> {
        Ok(self.tasks.add_project(name)?)
    }

    /// Updates settings and brings the timer in line with the new durations.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), AppError> {
        let result = self.settings.update(patch);
        self.timer.apply_settings(self.settings.get());
        Ok(result?)
    }

    pub fn reset_settings(&mut self) -> Result<(), AppError> {
        let result = self.settings.reset();
        self.timer.apply_settings(self.settings.get());
        Ok(result?)
    }

    /// Status line: timer state plus the bound task, if any.
    pub fn status_line(&self) -> String {
        let status = timer::format_status(self.timer.session());
        match self.tasks.active_task() {
            Some(task) => format!(
                "{}  {} ({}/{})",
                status, task.description, task.completed_pomodoros, task.estimated_pomodoros
            ),
            None => status,
        }
    }
}
