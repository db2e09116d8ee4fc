//! Data models for the Pomovate application.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The timer's current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    /// Focus interval.
    #[default]
    Pomodoro,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    /// Returns true for either break mode.
    pub fn is_break(&self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::ShortBreak => "Short break",
            Self::LongBreak => "Long break",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pomodoro" | "focus" | "work" => Ok(Self::Pomodoro),
            "short" | "shortbreak" | "short-break" | "short_break" => Ok(Self::ShortBreak),
            "long" | "longbreak" | "long-break" | "long_break" => Ok(Self::LongBreak),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "med" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A task in the active list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub estimated_pomodoros: u32,
    /// May exceed `estimated_pomodoros`.
    pub completed_pomodoros: u32,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// A task moved out of the active list.
///
/// `completed_pomodoros` is fractional since completing early credits the
/// elapsed share of the running pomodoro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: f64,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedTask {
    /// Promotes a task, replacing its pomodoro count with `completed_pomodoros`.
    pub fn from_task(task: Task, completed_pomodoros: f64, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: task.id,
            description: task.description,
            created_at: task.created_at,
            estimated_pomodoros: task.estimated_pomodoros,
            completed_pomodoros,
            priority: task.priority,
            project: task.project,
            completed_at,
        }
    }
}

/// A project tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// User-configurable settings for the pomodoro timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Duration of a pomodoro work session in minutes.
    pub pomodoro_time: u32,
    /// Duration of a short break in minutes.
    pub short_break_time: u32,
    /// Duration of a long break in minutes.
    pub long_break_time: u32,
    /// Number of pomodoros before a long break.
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    /// Whether to play a chime on timer completion.
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pomodoro_time: 25,
            short_break_time: 5,
            long_break_time: 15,
            long_break_interval: 4,
            auto_start_breaks: true,
            auto_start_pomodoros: true,
            sound_enabled: true,
        }
    }
}

impl Settings {
    /// Configured duration of `mode` in seconds.
    pub fn duration_secs(&self, mode: TimerMode) -> u32 {
        let mins = match mode {
            TimerMode::Pomodoro => self.pomodoro_time,
            TimerMode::ShortBreak => self.short_break_time,
            TimerMode::LongBreak => self.long_break_time,
        };
        mins.saturating_mul(60)
    }

    /// Whether entering `mode` through expiry starts the countdown immediately.
    pub fn auto_starts(&self, mode: TimerMode) -> bool {
        if mode.is_break() {
            self.auto_start_breaks
        } else {
            self.auto_start_pomodoros
        }
    }

    /// Returns these settings with every duration and the interval pulled
    /// into its valid range.
    pub fn clamped(mut self) -> Self {
        let bounded = SettingsPatch::full(&self).clamped();
        self.apply(&bounded);
        self
    }

    /// Merges the present fields of `patch` without validation.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.pomodoro_time {
            self.pomodoro_time = v;
        }
        if let Some(v) = patch.short_break_time {
            self.short_break_time = v;
        }
        if let Some(v) = patch.long_break_time {
            self.long_break_time = v;
        }
        if let Some(v) = patch.long_break_interval {
            self.long_break_interval = v;
        }
        if let Some(v) = patch.auto_start_breaks {
            self.auto_start_breaks = v;
        }
        if let Some(v) = patch.auto_start_pomodoros {
            self.auto_start_pomodoros = v;
        }
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
    }
}

/// A partial settings update. Absent fields are left untouched; unknown keys
/// in JSON input are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pomodoro_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_break_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_break_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_break_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start_breaks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start_pomodoros: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
}

impl SettingsPatch {
    /// A patch that sets every field to the value in `settings`.
    pub fn full(settings: &Settings) -> Self {
        Self {
            pomodoro_time: Some(settings.pomodoro_time),
            short_break_time: Some(settings.short_break_time),
            long_break_time: Some(settings.long_break_time),
            long_break_interval: Some(settings.long_break_interval),
            auto_start_breaks: Some(settings.auto_start_breaks),
            auto_start_pomodoros: Some(settings.auto_start_pomodoros),
            sound_enabled: Some(settings.sound_enabled),
        }
    }

    /// Clamps numeric fields into their valid ranges. Booleans pass through.
    pub fn clamped(self) -> Self {
        Self {
            pomodoro_time: self.pomodoro_time.map(|v| v.clamp(1, 60)),
            short_break_time: self.short_break_time.map(|v| v.clamp(1, 30)),
            long_break_time: self.long_break_time.map(|v| v.clamp(1, 60)),
            long_break_interval: self.long_break_interval.map(|v| v.clamp(1, 10)),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ephemeral state of the countdown. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSession {
    pub mode: TimerMode,
    pub time_left_secs: u32,
    pub elapsed_secs: u32,
    /// Duration of `mode` captured when it was entered.
    pub total_secs: u32,
    pub running: bool,
    /// Focus cycles completed since startup.
    pub completed_cycles: u32,
}

impl TimerSession {
    /// A stopped session at the start of `mode`.
    pub fn new(mode: TimerMode, total_secs: u32) -> Self {
        Self {
            mode,
            time_left_secs: total_secs,
            elapsed_secs: 0,
            total_secs,
            running: false,
            completed_cycles: 0,
        }
    }

    /// Returns the progress (0.0 to 1.0) through the current mode.
    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 1.0;
        }
        1.0 - (self.time_left_secs as f64 / self.total_secs as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.pomodoro_time, 25);
        assert_eq!(settings.short_break_time, 5);
        assert_eq!(settings.long_break_time, 15);
        assert_eq!(settings.long_break_interval, 4);
        assert!(settings.auto_start_breaks);
        assert!(settings.auto_start_pomodoros);
        assert!(settings.sound_enabled);
    }

    #[test]
    fn test_duration_secs_per_mode() {
        let settings = Settings::default();
        assert_eq!(settings.duration_secs(TimerMode::Pomodoro), 1500);
        assert_eq!(settings.duration_secs(TimerMode::ShortBreak), 300);
        assert_eq!(settings.duration_secs(TimerMode::LongBreak), 900);
    }

    #[test]
    fn test_duration_secs_saturates() {
        let settings = Settings {
            pomodoro_time: u32::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.duration_secs(TimerMode::Pomodoro), u32::MAX);
    }

    #[test]
    fn test_settings_clamped() {
        let settings = Settings {
            pomodoro_time: 0,
            short_break_time: 100_000_000,
            long_break_interval: 0,
            auto_start_breaks: false,
            ..Settings::default()
        }
        .clamped();
        assert_eq!(settings.pomodoro_time, 1);
        assert_eq!(settings.short_break_time, 30);
        assert_eq!(settings.long_break_time, 15);
        assert_eq!(settings.long_break_interval, 1);
        assert!(!settings.auto_start_breaks);
    }

    #[test]
    fn test_auto_starts_uses_matching_toggle() {
        let settings = Settings {
            auto_start_breaks: true,
            auto_start_pomodoros: false,
            ..Settings::default()
        };
        assert!(settings.auto_starts(TimerMode::ShortBreak));
        assert!(settings.auto_starts(TimerMode::LongBreak));
        assert!(!settings.auto_starts(TimerMode::Pomodoro));
    }

    #[test]
    fn test_patch_clamps_low_and_high() {
        let patch = SettingsPatch {
            pomodoro_time: Some(0),
            short_break_time: Some(45),
            long_break_time: Some(999),
            long_break_interval: Some(0),
            ..SettingsPatch::default()
        }
        .clamped();

        assert_eq!(patch.pomodoro_time, Some(1));
        assert_eq!(patch.short_break_time, Some(30));
        assert_eq!(patch.long_break_time, Some(60));
        assert_eq!(patch.long_break_interval, Some(1));
    }

    #[test]
    fn test_patch_ignores_unknown_fields() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"pomodoroTime": 30, "theme": "dark"}"#).unwrap();
        assert_eq!(patch.pomodoro_time, Some(30));
        assert_eq!(patch.short_break_time, None);
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut settings = Settings::default();
        settings.apply(&SettingsPatch {
            sound_enabled: Some(false),
            ..SettingsPatch::default()
        });
        assert!(!settings.sound_enabled);
        assert_eq!(settings.pomodoro_time, 25);
    }

    #[test]
    fn test_settings_json_uses_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["pomodoroTime"], 25);
        assert_eq!(json["longBreakInterval"], 4);
        assert_eq!(json["autoStartBreaks"], true);
    }

    #[test]
    fn test_mode_and_priority_parsing() {
        assert_eq!("short-break".parse::<TimerMode>(), Ok(TimerMode::ShortBreak));
        assert_eq!("Long".parse::<TimerMode>(), Ok(TimerMode::LongBreak));
        assert!("nap".parse::<TimerMode>().is_err());
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_session_progress() {
        let mut session = TimerSession::new(TimerMode::Pomodoro, 1500);
        assert_eq!(session.progress(), 0.0);
        session.time_left_secs = 1200;
        assert!((session.progress() - 0.2).abs() < 0.01);
        assert_eq!(TimerSession::new(TimerMode::Pomodoro, 0).progress(), 1.0);
    }

    #[test]
    fn test_completed_task_from_task() {
        let task = Task {
            id: "a".to_string(),
            description: "Write report".to_string(),
            created_at: Utc::now(),
            estimated_pomodoros: 3,
            completed_pomodoros: 2,
            priority: Priority::High,
            project: Some("Work".to_string()),
        };
        let done_at = Utc::now();
        let done = CompletedTask::from_task(task.clone(), 2.5, done_at);
        assert_eq!(done.id, task.id);
        assert_eq!(done.completed_pomodoros, 2.5);
        assert_eq!(done.project.as_deref(), Some("Work"));
        assert_eq!(done.completed_at, done_at);
    }
}
