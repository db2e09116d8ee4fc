//! Pomovate - a pomodoro timer coupled to a task list.
//!
//! The timer counts down focus and break intervals, credits finished
//! pomodoros to the active task, and persists settings, tasks and history
//! to SQLite or a local JSON store.

pub mod app;
pub mod audio;
pub mod config;
pub mod event;
pub mod models;
pub mod notifications;
pub mod persistence;
pub mod settings;
pub mod tasks;
pub mod timer;

pub use app::{App, AppError};
