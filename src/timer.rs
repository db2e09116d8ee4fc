//! Countdown engine for the pomodoro / short break / long break cycle.

use tracing::{debug, warn};

use crate::models::{CompletedTask, Settings, TimerMode, TimerSession};
use crate::persistence::PersistenceError;
use crate::tasks::TaskStore;

/// Emitted when a countdown runs out, for notifications and sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionEvent {
    /// A focus interval finished; `cycles` counts focus intervals so far.
    PomodoroComplete { cycles: u32, next: TimerMode },
    BreakComplete,
}

pub struct TimerEngine {
    session: TimerSession,
}

impl TimerEngine {
    /// A stopped engine at the start of a pomodoro.
    pub fn new(settings: &Settings) -> Self {
        Self {
            session: TimerSession::new(
                TimerMode::Pomodoro,
                settings.duration_secs(TimerMode::Pomodoro),
            ),
        }
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn mode(&self) -> TimerMode {
        self.session.mode
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    pub fn start(&mut self) {
        self.session.running = true;
    }

    pub fn pause(&mut self) {
        self.session.running = false;
    }

    pub fn toggle(&mut self) {
        self.session.running = !self.session.running;
    }

    /// Advances the countdown by one second.
    /// Returns (state_changed, optional_completion_event).
    ///
    /// Expiry fires only on the step that takes the countdown from 1 to 0,
    /// so a tick that lands on an already finished countdown does nothing.
    pub fn tick(
        &mut self,
        settings: &Settings,
        tasks: &mut TaskStore,
    ) -> (bool, Option<CompletionEvent>) {
        if !self.session.running || self.session.time_left_secs == 0 {
            return (false, None);
        }

        self.session.time_left_secs -= 1;
        self.session.elapsed_secs += 1;

        if self.session.time_left_secs > 0 {
            return (true, None);
        }

        let event = self.expire(settings, tasks);
        (true, Some(event))
    }

    /// Restarts the current mode from its full duration, stopped.
    pub fn reset(&mut self, settings: &Settings) {
        self.enter(self.session.mode, settings, false);
    }

    /// Switches mode by user request. Never auto-starts.
    pub fn set_mode(&mut self, mode: TimerMode, settings: &Settings) {
        self.enter(mode, settings, false);
    }

    /// Share of the current pomodoro already elapsed. Zero during breaks.
    pub fn partial_progress(&self) -> f64 {
        if self.session.mode != TimerMode::Pomodoro || self.session.total_secs == 0 {
            return 0.0;
        }
        (self.session.elapsed_secs as f64 / self.session.total_secs as f64).min(1.0)
    }

    /// Completes the active task before the pomodoro runs out, crediting the
    /// elapsed share of the pomodoro, then resets the session.
    pub fn complete_active_task_early(
        &mut self,
        settings: &Settings,
        tasks: &mut TaskStore,
    ) -> Result<Option<CompletedTask>, PersistenceError> {
        let Some(id) = tasks.active_task_id().map(str::to_string) else {
            return Ok(None);
        };

        let result = tasks.complete_task(&id, self.partial_progress());
        self.reset(settings);
        result
    }

    /// Keeps the session consistent after the durations changed.
    ///
    /// An untouched session picks up the new duration; one in progress keeps
    /// its place but never exceeds the new duration.
    pub fn apply_settings(&mut self, settings: &Settings) {
        let total = settings.duration_secs(self.session.mode);
        if total == self.session.total_secs {
            return;
        }

        if !self.session.running && self.session.elapsed_secs == 0 {
            self.session.time_left_secs = total;
        } else {
            self.session.time_left_secs = self.session.time_left_secs.min(total);
        }
        self.session.total_secs = total;
    }

    fn enter(&mut self, mode: TimerMode, settings: &Settings, running: bool) {
        let total = settings.duration_secs(mode);
        self.session.mode = mode;
        self.session.total_secs = total;
        self.session.time_left_secs = total;
        self.session.elapsed_secs = 0;
        self.session.running = running;
    }

    fn expire(&mut self, settings: &Settings, tasks: &mut TaskStore) -> CompletionEvent {
        match self.session.mode {
            TimerMode::Pomodoro => {
                self.session.completed_cycles += 1;
                let cycles = self.session.completed_cycles;

                if let Some(id) = tasks.active_task_id().map(str::to_string) {
                    if let Err(e) = tasks.update_progress(&id) {
                        warn!(error = %e, task = %id, "pomodoro credited in memory only");
                    }
                }

                let next = if cycles % settings.long_break_interval.max(1) == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                };
                self.enter(next, settings, settings.auto_starts(next));
                debug!(cycles, next = %next, "pomodoro finished");

                CompletionEvent::PomodoroComplete { cycles, next }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                let auto = settings.auto_starts(TimerMode::Pomodoro);
                self.enter(TimerMode::Pomodoro, settings, auto);
                debug!("break finished");
                CompletionEvent::BreakComplete
            }
        }
    }
}

/// Formats a one-line status for the current session.
pub fn format_status(session: &TimerSession) -> String {
    let icon = if !session.running {
        "⏸"
    } else if session.mode.is_break() {
        "☕"
    } else {
        "🍅"
    };
    format!(
        "{} {} {}",
        icon,
        session.mode,
        format_time(session.time_left_secs)
    )
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::persistence::{Backend, RejectingBackend, SqliteBackend};
    use std::rc::Rc;

    fn create_test_tasks() -> TaskStore {
        let backend: Rc<dyn Backend> = Rc::new(SqliteBackend::open_in_memory().unwrap());
        TaskStore::load(backend).unwrap()
    }

    fn quick_settings() -> Settings {
        Settings {
            pomodoro_time: 1,
            short_break_time: 2,
            long_break_time: 3,
            long_break_interval: 2,
            ..Settings::default()
        }
    }

    /// Ticks until a completion event, at most `limit` times.
    fn run_until_complete(
        timer: &mut TimerEngine,
        settings: &Settings,
        tasks: &mut TaskStore,
        limit: u32,
    ) -> Option<CompletionEvent> {
        for _ in 0..limit {
            if let (_, Some(event)) = timer.tick(settings, tasks) {
                return Some(event);
            }
        }
        None
    }

    #[test]
    fn test_new_engine_is_stopped_pomodoro() {
        let timer = TimerEngine::new(&Settings::default());
        let session = timer.session();
        assert_eq!(session.mode, TimerMode::Pomodoro);
        assert_eq!(session.time_left_secs, 25 * 60);
        assert_eq!(session.elapsed_secs, 0);
        assert!(!session.running);
        assert_eq!(session.completed_cycles, 0);
    }

    #[test]
    fn test_tick_while_paused_does_nothing() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);

        assert_eq!(timer.tick(&settings, &mut tasks), (false, None));
        assert_eq!(timer.session().time_left_secs, 60);

        timer.start();
        assert_eq!(timer.tick(&settings, &mut tasks), (true, None));
        timer.pause();
        assert_eq!(timer.tick(&settings, &mut tasks), (false, None));
        assert_eq!(timer.session().time_left_secs, 59);
        assert_eq!(timer.session().elapsed_secs, 1);
    }

    #[test]
    fn test_toggle_flips_running() {
        let mut timer = TimerEngine::new(&Settings::default());
        timer.toggle();
        assert!(timer.is_running());
        timer.toggle();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_pomodoro_expires_to_short_break() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();

        let mut ticks = 0;
        let mut event = None;
        while event.is_none() && ticks < 100 {
            event = timer.tick(&settings, &mut tasks).1;
            ticks += 1;
        }

        assert_eq!(ticks, 60);
        assert_eq!(
            event,
            Some(CompletionEvent::PomodoroComplete {
                cycles: 1,
                next: TimerMode::ShortBreak
            })
        );
        let session = timer.session();
        assert_eq!(session.mode, TimerMode::ShortBreak);
        assert_eq!(session.time_left_secs, 120);
        assert_eq!(session.elapsed_secs, 0);
        assert!(session.running);
    }

    #[test]
    fn test_long_break_on_interval() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();

        let first = run_until_complete(&mut timer, &settings, &mut tasks, 61);
        assert!(matches!(
            first,
            Some(CompletionEvent::PomodoroComplete { next: TimerMode::ShortBreak, .. })
        ));

        let brk = run_until_complete(&mut timer, &settings, &mut tasks, 121);
        assert_eq!(brk, Some(CompletionEvent::BreakComplete));
        assert_eq!(timer.mode(), TimerMode::Pomodoro);

        let second = run_until_complete(&mut timer, &settings, &mut tasks, 61);
        assert_eq!(
            second,
            Some(CompletionEvent::PomodoroComplete {
                cycles: 2,
                next: TimerMode::LongBreak
            })
        );
        assert_eq!(timer.session().time_left_secs, 180);

        let brk = run_until_complete(&mut timer, &settings, &mut tasks, 181);
        assert_eq!(brk, Some(CompletionEvent::BreakComplete));
        assert_eq!(timer.mode(), TimerMode::Pomodoro);
    }

    #[test]
    fn test_interval_of_one_always_long_break() {
        let settings = Settings {
            long_break_interval: 1,
            ..quick_settings()
        };
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();

        let event = run_until_complete(&mut timer, &settings, &mut tasks, 61);
        assert!(matches!(
            event,
            Some(CompletionEvent::PomodoroComplete { next: TimerMode::LongBreak, .. })
        ));
    }

    #[test]
    fn test_auto_start_settings_control_running() {
        let settings = Settings {
            auto_start_breaks: false,
            auto_start_pomodoros: true,
            ..quick_settings()
        };
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();

        run_until_complete(&mut timer, &settings, &mut tasks, 61);
        assert_eq!(timer.mode(), TimerMode::ShortBreak);
        assert!(!timer.is_running());

        timer.start();
        run_until_complete(&mut timer, &settings, &mut tasks, 121);
        assert_eq!(timer.mode(), TimerMode::Pomodoro);
        assert!(timer.is_running());
    }

    #[test]
    fn test_expiry_fires_once() {
        let settings = Settings {
            auto_start_breaks: false,
            ..quick_settings()
        };
        let mut tasks = create_test_tasks();
        let task = tasks.add_task("Read", 1, Priority::Low, None).unwrap();
        tasks.set_active_task(Some(&task.id));

        let mut timer = TimerEngine::new(&settings);
        timer.start();

        let mut events = 0;
        for _ in 0..200 {
            if timer.tick(&settings, &mut tasks).1.is_some() {
                events += 1;
            }
        }

        assert_eq!(events, 1);
        assert_eq!(timer.session().completed_cycles, 1);
        assert_eq!(tasks.get(&task.id).unwrap().completed_pomodoros, 1);
    }

    #[test]
    fn test_expiry_credits_active_task() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let task = tasks.add_task("Read", 1, Priority::Low, None).unwrap();
        let idle = tasks.add_task("Idle", 1, Priority::Low, None).unwrap();
        tasks.set_active_task(Some(&task.id));

        let mut timer = TimerEngine::new(&settings);
        timer.start();
        run_until_complete(&mut timer, &settings, &mut tasks, 61);

        assert_eq!(tasks.get(&task.id).unwrap().completed_pomodoros, 1);
        assert_eq!(tasks.get(&idle.id).unwrap().completed_pomodoros, 0);
    }

    #[test]
    fn test_break_expiry_does_not_credit_task() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let task = tasks.add_task("Read", 1, Priority::Low, None).unwrap();
        tasks.set_active_task(Some(&task.id));

        let mut timer = TimerEngine::new(&settings);
        timer.set_mode(TimerMode::ShortBreak, &settings);
        timer.start();
        run_until_complete(&mut timer, &settings, &mut tasks, 121);

        assert_eq!(timer.mode(), TimerMode::Pomodoro);
        assert_eq!(tasks.get(&task.id).unwrap().completed_pomodoros, 0);
        assert_eq!(timer.session().completed_cycles, 0);
    }

    #[test]
    fn test_expiry_tolerates_deleted_active_task() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let task = tasks.add_task("Read", 1, Priority::Low, None).unwrap();
        tasks.set_active_task(Some(&task.id));

        let mut timer = TimerEngine::new(&settings);
        timer.start();
        for _ in 0..30 {
            timer.tick(&settings, &mut tasks);
        }
        tasks.delete_task(&task.id).unwrap();
        tasks.set_active_task(Some(&task.id));

        let event = run_until_complete(&mut timer, &settings, &mut tasks, 31);
        assert!(matches!(event, Some(CompletionEvent::PomodoroComplete { .. })));
        assert!(tasks.tasks().is_empty());
    }

    #[test]
    fn test_expiry_survives_failed_progress_write() {
        let settings = quick_settings();
        let mut tasks = TaskStore::load(Rc::new(RejectingBackend)).unwrap();
        let _ = tasks.add_task("Read", 1, Priority::Low, None);
        let id = tasks.tasks()[0].id.clone();
        tasks.set_active_task(Some(&id));

        let mut timer = TimerEngine::new(&settings);
        timer.start();
        let event = run_until_complete(&mut timer, &settings, &mut tasks, 60);

        assert_eq!(
            event,
            Some(CompletionEvent::PomodoroComplete {
                cycles: 1,
                next: TimerMode::ShortBreak
            })
        );
        assert_eq!(timer.mode(), TimerMode::ShortBreak);
        assert_eq!(timer.session().time_left_secs, 2 * 60);
        assert_eq!(tasks.get(&id).unwrap().completed_pomodoros, 1);
    }

    #[test]
    fn test_reset_keeps_mode_and_cycles() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();
        run_until_complete(&mut timer, &settings, &mut tasks, 61);
        for _ in 0..10 {
            timer.tick(&settings, &mut tasks);
        }

        timer.reset(&settings);
        let session = timer.session();
        assert_eq!(session.mode, TimerMode::ShortBreak);
        assert_eq!(session.time_left_secs, 120);
        assert_eq!(session.elapsed_secs, 0);
        assert!(!session.running);
        assert_eq!(session.completed_cycles, 1);
    }

    #[test]
    fn test_set_mode_never_auto_starts() {
        let settings = Settings::default();
        let mut timer = TimerEngine::new(&settings);
        timer.start();

        timer.set_mode(TimerMode::LongBreak, &settings);
        let session = timer.session();
        assert_eq!(session.mode, TimerMode::LongBreak);
        assert_eq!(session.time_left_secs, 15 * 60);
        assert!(!session.running);
    }

    #[test]
    fn test_complete_active_task_early_credits_fraction() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let task = tasks.add_task("Read", 2, Priority::Low, None).unwrap();
        tasks.set_active_task(Some(&task.id));

        let mut timer = TimerEngine::new(&settings);
        timer.start();
        for _ in 0..30 {
            timer.tick(&settings, &mut tasks);
        }
        assert!((timer.partial_progress() - 0.5).abs() < 1e-9);

        let done = timer
            .complete_active_task_early(&settings, &mut tasks)
            .unwrap()
            .unwrap();
        assert!((done.completed_pomodoros - 0.5).abs() < 1e-9);
        assert!(tasks.active_task_id().is_none());

        let session = timer.session();
        assert_eq!(session.mode, TimerMode::Pomodoro);
        assert_eq!(session.time_left_secs, 60);
        assert_eq!(session.elapsed_secs, 0);
        assert!(!session.running);
    }

    #[test]
    fn test_complete_early_without_active_task() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();
        timer.tick(&settings, &mut tasks);

        assert!(timer
            .complete_active_task_early(&settings, &mut tasks)
            .unwrap()
            .is_none());
        assert!(timer.is_running());
    }

    #[test]
    fn test_partial_progress_is_zero_in_breaks() {
        let settings = quick_settings();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.set_mode(TimerMode::ShortBreak, &settings);
        timer.start();
        timer.tick(&settings, &mut tasks);
        assert_eq!(timer.partial_progress(), 0.0);
    }

    #[test]
    fn test_apply_settings_untouched_session_adopts_duration() {
        let mut settings = Settings::default();
        let mut timer = TimerEngine::new(&settings);

        settings.pomodoro_time = 50;
        timer.apply_settings(&settings);
        assert_eq!(timer.session().time_left_secs, 50 * 60);
        assert_eq!(timer.session().total_secs, 50 * 60);
    }

    #[test]
    fn test_apply_settings_clamps_running_session() {
        let mut settings = Settings::default();
        let mut tasks = create_test_tasks();
        let mut timer = TimerEngine::new(&settings);
        timer.start();
        timer.tick(&settings, &mut tasks);

        settings.pomodoro_time = 1;
        timer.apply_settings(&settings);
        let session = timer.session();
        assert_eq!(session.time_left_secs, 60);
        assert_eq!(session.total_secs, 60);
        assert_eq!(session.elapsed_secs, 1);
    }

    #[test]
    fn test_format_status() {
        let mut session = TimerSession::new(TimerMode::Pomodoro, 1500);
        assert_eq!(format_status(&session), "⏸ Pomodoro 25:00");

        session.running = true;
        session.time_left_secs = 1432;
        assert_eq!(format_status(&session), "🍅 Pomodoro 23:52");

        session.mode = TimerMode::ShortBreak;
        session.time_left_secs = 272;
        assert_eq!(format_status(&session), "☕ Short break 04:32");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(60), "01:00");
        assert_eq!(format_time(125), "02:05");
        assert_eq!(format_time(1500), "25:00");
        assert_eq!(format_time(3599), "59:59");
    }
}
