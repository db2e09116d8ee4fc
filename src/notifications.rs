//! Desktop notifications for timer events.

use notify_rust::Notification;
use std::thread;
use tracing::warn;

use crate::models::TimerMode;
use crate::timer::CompletionEvent;

/// Title and body shown for a completion event.
pub fn message_for(event: &CompletionEvent, task: Option<&str>) -> (String, String) {
    match event {
        CompletionEvent::PomodoroComplete { cycles, next } => {
            let summary = match next {
                TimerMode::LongBreak => "Long Break Time! 🎉".to_string(),
                _ => "Pomodoro Complete! 🍅".to_string(),
            };
            let done = if *cycles == 1 {
                "You've completed 1 pomodoro.".to_string()
            } else {
                format!("You've completed {} pomodoros.", cycles)
            };
            let body = match task {
                Some(task) => format!("{done}\n+1 on \"{task}\". Time for a break."),
                None => format!("{done}\nTime for a break."),
            };
            (summary, body)
        }
        CompletionEvent::BreakComplete => (
            "Break Over! ☕".to_string(),
            "Ready to start another pomodoro?".to_string(),
        ),
    }
}

/// Shows a notification for `event`.
/// Runs in a background thread to avoid blocking.
pub fn notify(event: CompletionEvent, task: Option<String>) {
    thread::spawn(move || {
        let (summary, body) = message_for(&event, task.as_deref());
        if let Err(e) = Notification::new()
            .summary(&summary)
            .body(&body)
            .appname("Pomovate")
            .show()
        {
            warn!(error = %e, "failed to show notification");
        }
    });
}
