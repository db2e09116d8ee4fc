//! Event sources and command handling for the interactive timer.
//!
//! A ticker thread and a stdin reader feed one channel; the thread that owns
//! [`App`] drains it, so ticks and user commands are handled one at a time.

use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::app::App;
use crate::models::TimerMode;
use crate::timer::CompletionEvent;

/// Something for the event loop to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One second of wall-clock time passed.
    Tick,
    /// A line of user input.
    Input(String),
    /// Input reached end of file.
    InputClosed,
}

/// A parsed user command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Reset,
    Mode(TimerMode),
    /// Complete the active task early.
    Complete,
    Activate(String),
    Deactivate,
    Status,
    Help,
    Quit,
}

/// Result of handling a command.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event handled, nothing to show.
    Continue,
    /// User requested quit.
    Quit,
    /// State changed, status needs redraw.
    StateChanged,
    /// Text for the user.
    Message(String),
}

pub const HELP: &str = "\
commands:
  s, start        start the countdown
  p, pause        pause the countdown
  t, <enter>      toggle start/pause
  r, reset        restart the current mode
  m <mode>        switch to pomodoro | short | long
  a <task-id>     bind the timer to a task
  d, deactivate   unbind the current task
  c, complete     complete the active task now
  status          show the timer state and progress
  q, quit         exit";

/// Parses one line of input.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(Command::Toggle);
    };
    let arg = parts.collect::<Vec<_>>().join(" ");

    match (word.to_ascii_lowercase().as_str(), arg.is_empty()) {
        ("s" | "start", true) => Ok(Command::Start),
        ("p" | "pause", true) => Ok(Command::Pause),
        ("t" | "toggle", true) => Ok(Command::Toggle),
        ("r" | "reset", true) => Ok(Command::Reset),
        ("m" | "mode", false) => arg.parse().map(Command::Mode),
        ("m" | "mode", true) => Err("usage: m <pomodoro|short|long>".to_string()),
        ("a" | "activate", false) => Ok(Command::Activate(arg)),
        ("a" | "activate", true) => Err("usage: a <task-id>".to_string()),
        ("d" | "deactivate", true) => Ok(Command::Deactivate),
        ("c" | "complete", true) => Ok(Command::Complete),
        ("status", true) => Ok(Command::Status),
        ("h" | "help" | "?", true) => Ok(Command::Help),
        ("q" | "quit" | "exit", true) => Ok(Command::Quit),
        _ => Err(format!("unknown command: {}", line.trim())),
    }
}

/// Applies a command to the app.
pub fn handle_command(app: &mut App, command: Command) -> EventResult {
    debug!(?command, "command");
    match command {
        Command::Start => {
            app.start();
            EventResult::StateChanged
        }
        Command::Pause => {
            app.pause();
            EventResult::StateChanged
        }
        Command::Toggle => {
            app.toggle();
            EventResult::StateChanged
        }
        Command::Reset => {
            app.reset_timer();
            EventResult::StateChanged
        }
        Command::Mode(mode) => {
            app.set_mode(mode);
            EventResult::StateChanged
        }
        Command::Activate(id) => match app.activate_task(&id) {
            Ok(task) => EventResult::Message(format!("Active task: {}", task.description)),
            Err(e) => EventResult::Message(e.to_string()),
        },
        Command::Deactivate => {
            app.deactivate_task();
            EventResult::StateChanged
        }
        Command::Complete => match app.complete_active_task() {
            Ok(Some(done)) => EventResult::Message(format!(
                "Completed \"{}\" with {:.2} pomodoros",
                done.description, done.completed_pomodoros
            )),
            Ok(None) => EventResult::Message("No active task".to_string()),
            Err(e) => EventResult::Message(e.to_string()),
        },
        Command::Status => EventResult::Message(format!(
            "{}  [{:.0}% done]",
            app.status_line(),
            app.timer.session().progress() * 100.0
        )),
        Command::Help => EventResult::Message(HELP.to_string()),
        Command::Quit => EventResult::Quit,
    }
}

/// Applies one event. Returns the command result and, for ticks that ran a
/// countdown out, the completion event.
pub fn handle_event(app: &mut App, event: Event) -> (EventResult, Option<CompletionEvent>) {
    match event {
        Event::Tick => {
            let (changed, completion) = app.tick();
            let result = if changed {
                EventResult::StateChanged
            } else {
                EventResult::Continue
            };
            (result, completion)
        }
        Event::Input(line) => match parse_command(&line) {
            Ok(command) => (handle_command(app, command), None),
            Err(message) => (EventResult::Message(message), None),
        },
        Event::InputClosed => (EventResult::Quit, None),
    }
}

/// Sends [`Event::Tick`] every second until the receiver goes away.
pub fn spawn_ticker(tx: Sender<Event>) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(1));
        if tx.send(Event::Tick).is_err() {
            break;
        }
    })
}

/// Forwards lines from `input` until end of file or the receiver goes away.
pub fn spawn_input_reader<R>(input: R, tx: Sender<Event>) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else { break };
            if tx.send(Event::Input(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::InputClosed);
    })
}
