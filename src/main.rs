//! Pomovate - a terminal Pomodoro timer with task tracking.

use std::error::Error;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pomovate::audio::AudioPlayer;
use pomovate::config::Config;
use pomovate::event::{self, Event, EventResult};
use pomovate::models::{Priority, SettingsPatch, TimerMode};
use pomovate::persistence::{self, BackendKind};
use pomovate::tasks::NO_PROJECT;
use pomovate::timer::CompletionEvent;
use pomovate::{notifications, App};

#[derive(Parser)]
#[command(name = "pomovate", version, about = "Pomodoro timer with task tracking")]
struct Cli {
    /// Storage backend: sqlite or local (detected when omitted)
    #[arg(long, global = true)]
    backend: Option<BackendKind>,
    /// Directory holding the database or local storage file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Project management
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Timer settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Completed tasks, newest first
    History {
        /// Group by project
        #[arg(long)]
        by_project: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run the interactive timer
    Timer {
        /// Task to bind the timer to (id or unique prefix)
        #[arg(long)]
        task: Option<String>,
        /// Mode to start in: pomodoro, short or long
        #[arg(long)]
        mode: Option<TimerMode>,
        /// Start counting down immediately
        #[arg(long)]
        start: bool,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add {
        description: String,
        /// Estimated pomodoros
        #[arg(short, long, default_value_t = 1)]
        estimate: u32,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        project: Option<String>,
    },
    /// List active tasks
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a task
    Delete { id: String },
    /// Move a task to the history
    Complete { id: String },
    /// Record one finished pomodoro on a task
    Progress { id: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Add a project
    Add { name: String },
    /// List projects
    List,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show current settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change settings; values outside the allowed range are clamped
    Set {
        /// Pomodoro length in minutes (1-60)
        #[arg(long)]
        pomodoro_time: Option<u32>,
        /// Short break length in minutes (1-30)
        #[arg(long)]
        short_break_time: Option<u32>,
        /// Long break length in minutes (1-60)
        #[arg(long)]
        long_break_time: Option<u32>,
        /// Pomodoros before a long break (1-10)
        #[arg(long)]
        long_break_interval: Option<u32>,
        #[arg(long)]
        auto_start_breaks: Option<bool>,
        #[arg(long)]
        auto_start_pomodoros: Option<bool>,
        #[arg(long)]
        sound_enabled: Option<bool>,
    },
    /// Restore defaults
    Reset,
}

/// Interactive timer: owns the app and drains the event channel.
struct Pomovate {
    app: App,
    events: Receiver<Event>,
    audio: AudioPlayer,
    notifications: bool,
}

impl Pomovate {
    fn new(app: App, events: Receiver<Event>, notifications: bool) -> Self {
        Self {
            app,
            events,
            audio: AudioPlayer::new(),
            notifications,
        }
    }

    fn run(&mut self) -> io::Result<()> {
        println!("{}", event::HELP);
        self.draw_status()?;

        while let Ok(ev) = self.events.recv() {
            let (result, completion) = event::handle_event(&mut self.app, ev);

            if let Some(completion) = completion {
                self.handle_completion(completion)?;
            }

            match result {
                EventResult::Quit => break,
                EventResult::StateChanged => self.draw_status()?,
                EventResult::Message(message) => {
                    println!("\r\x1b[K{message}");
                    self.draw_status()?;
                }
                EventResult::Continue => {}
            }
        }

        println!();
        Ok(())
    }

    fn draw_status(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "\r\x1b[K{}", self.app.status_line())?;
        out.flush()
    }

    fn handle_completion(&self, completion: CompletionEvent) -> io::Result<()> {
        let task = self
            .app
            .tasks
            .active_task()
            .map(|task| task.description.clone());
        let (summary, body) = notifications::message_for(&completion, task.as_deref());
        println!("\r\x1b[K{summary} {}", body.replace('\n', " "));

        if self.app.settings.get().sound_enabled {
            if let Err(e) = self.audio.play_chime() {
                warn!(error = %e, "failed to play chime");
            }
        }
        if self.notifications {
            notifications::notify(completion, task);
        }
        Ok(())
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pomovate=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_task(app: &mut App, action: TaskAction) -> Result<(), Box<dyn Error>> {
    match action {
        TaskAction::Add {
            description,
            estimate,
            priority,
            project,
        } => {
            let task = app.add_task(&description, estimate, priority, project.as_deref())?;
            println!("Task created: {} {}", task.id, task.description);
        }
        TaskAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(app.tasks.tasks())?);
                return Ok(());
            }
            if app.tasks.tasks().is_empty() {
                println!("No tasks.");
            }
            for task in app.tasks.tasks() {
                println!(
                    "{}  🍅 {}/{}  [{}]{}  {}",
                    task.id.get(..8).unwrap_or(&task.id),
                    task.completed_pomodoros,
                    task.estimated_pomodoros,
                    task.priority,
                    task.project
                        .as_deref()
                        .map(|p| format!(" ({p})"))
                        .unwrap_or_default(),
                    task.description
                );
            }
        }
        TaskAction::Delete { id } => {
            let id = app.resolve_task(&id)?;
            app.delete_task(&id)?;
            println!("Task deleted: {id}");
        }
        TaskAction::Complete { id } => {
            let id = app.resolve_task(&id)?;
            if let Some(done) = app.complete_task(&id)? {
                println!(
                    "Task completed: {} ({} pomodoros)",
                    done.description, done.completed_pomodoros
                );
            }
        }
        TaskAction::Progress { id } => {
            let id = app.resolve_task(&id)?;
            app.update_progress(&id)?;
            if let Some(task) = app.tasks.get(&id) {
                println!(
                    "{}: {}/{} pomodoros",
                    task.description, task.completed_pomodoros, task.estimated_pomodoros
                );
            }
        }
    }
    Ok(())
}

fn run_project(app: &mut App, action: ProjectAction) -> Result<(), Box<dyn Error>> {
    match action {
        ProjectAction::Add { name } => {
            app.add_project(&name)?;
            println!("Project: {name}");
        }
        ProjectAction::List => {
            for name in app.tasks.projects() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn run_settings(app: &mut App, action: SettingsAction) -> Result<(), Box<dyn Error>> {
    match action {
        SettingsAction::Show { json } => {
            let settings = app.settings.get();
            if json {
                println!("{}", serde_json::to_string_pretty(settings)?);
            } else {
                println!("Pomodoro:             {} min", settings.pomodoro_time);
                println!("Short break:          {} min", settings.short_break_time);
                println!("Long break:           {} min", settings.long_break_time);
                println!("Long break interval:  {}", settings.long_break_interval);
                println!("Auto-start breaks:    {}", settings.auto_start_breaks);
                println!("Auto-start pomodoros: {}", settings.auto_start_pomodoros);
                println!("Sound:                {}", settings.sound_enabled);
            }
        }
        SettingsAction::Set {
            pomodoro_time,
            short_break_time,
            long_break_time,
            long_break_interval,
            auto_start_breaks,
            auto_start_pomodoros,
            sound_enabled,
        } => {
            app.update_settings(SettingsPatch {
                pomodoro_time,
                short_break_time,
                long_break_time,
                long_break_interval,
                auto_start_breaks,
                auto_start_pomodoros,
                sound_enabled,
            })?;
            println!("{}", serde_json::to_string_pretty(app.settings.get())?);
        }
        SettingsAction::Reset => {
            app.reset_settings()?;
            println!("Settings reset to defaults.");
        }
    }
    Ok(())
}

fn run_history(app: &App, by_project: bool, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(app.tasks.completed_tasks())?);
        return Ok(());
    }

    let line = |task: &pomovate::models::CompletedTask| {
        format!(
            "  🍅 {:.2}  {}  {}",
            task.completed_pomodoros,
            task.completed_at.format("%Y-%m-%d"),
            task.description
        )
    };

    if by_project {
        for (project, tasks) in app.tasks.history_by_project() {
            println!("{project}");
            for task in tasks {
                println!("{}", line(task));
            }
        }
    } else {
        for task in app.tasks.completed_tasks() {
            let project = task.project.as_deref().unwrap_or(NO_PROJECT);
            println!("{}  [{project}]", line(task));
        }
    }
    Ok(())
}

fn run_timer(
    mut app: App,
    config: &Config,
    task: Option<String>,
    mode: Option<TimerMode>,
    start: bool,
) -> Result<(), Box<dyn Error>> {
    if let Some(mode) = mode {
        app.set_mode(mode);
    }
    if let Some(task) = task {
        let task = app.activate_task(&task)?;
        info!(task = %task.id, "timer bound to task");
    }
    if start {
        app.start();
    }

    let (tx, rx) = mpsc::channel();
    event::spawn_ticker(tx.clone());
    event::spawn_input_reader(BufReader::new(io::stdin()), tx);

    Pomovate::new(app, rx, config.notifications).run()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.backend.is_some() {
        config.backend = cli.backend;
    }

    let backend = persistence::open(&config.data_dir, config.backend)?;
    let mut app = App::new(Rc::from(backend))?;

    match cli.command {
        Commands::Task { action } => run_task(&mut app, action),
        Commands::Project { action } => run_project(&mut app, action),
        Commands::Settings { action } => run_settings(&mut app, action),
        Commands::History { by_project, json } => run_history(&app, by_project, json),
        Commands::Timer { task, mode, start } => run_timer(app, &config, task, mode, start),
    }
}
