//! Command-line front end.
//!
//! One-shot commands open the collection, apply one operation and exit.
//! `run` keeps the scheduler going in the background and reads the same
//! commands from stdin until `quit` or end of input.

use crate::config::{default_config_path, Config};
use crate::error::{AppError, AppResult};
use crate::reminder::{
    parse_date_time, NewReminder, Reminder, ReminderId, ReminderPatch, Repeat, Status,
};
use crate::scheduler::{Scheduler, TickReport};
use crate::service::ReminderService;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Notes longer than this are shortened in listings
const NOTE_DISPLAY_LIMIT: usize = 43;

#[derive(Parser, Debug)]
#[command(name = "reminder", version, about = "Personal reminder scheduler")]
pub struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding reminders.json (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a reminder; the time must be in the future
    Add {
        #[arg(long)]
        title: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM, 24h
        #[arg(long)]
        time: String,
        #[arg(long, default_value = "")]
        note: String,
        #[arg(long, value_enum, default_value_t = RepeatArg::None)]
        repeat: RepeatArg,
    },
    /// Change fields of an existing reminder
    Edit {
        id: ReminderId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long, value_enum)]
        repeat: Option<RepeatArg>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Delete a reminder
    Delete { id: ReminderId },
    /// Show upcoming reminders
    List,
    /// Show notified and missed reminders
    History,
    /// Run the scheduler with an interactive prompt
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatArg {
    None,
    Daily,
    Weekly,
}

impl From<RepeatArg> for Repeat {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::None => Repeat::Never,
            RepeatArg::Daily => Repeat::Daily,
            RepeatArg::Weekly => Repeat::Weekly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Pending,
    Notified,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Status::Pending,
            StatusArg::Notified => Status::Notified,
        }
    }
}

/// A single line typed at the `run` prompt.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "reminder>")]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// Resolves configuration from `--config` / `--data-dir`.
pub fn load_config(cli: &Cli) -> AppResult<Config> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&path)?;
    Ok(match &cli.data_dir {
        Some(dir) => config.with_data_dir(dir.clone()),
        None => config,
    })
}

/// Runs a parsed command against a freshly opened collection.
pub fn run(command: Command, config: &Config) -> AppResult<()> {
    let service = ReminderService::open(config);
    match command {
        Command::Run => run_interactive(&service, config),
        other => {
            let output = execute(&service, other)?;
            print!("{}", output);
            Ok(())
        }
    }
}

/// Applies one command and renders its output.
pub fn execute(service: &ReminderService, command: Command) -> AppResult<String> {
    match command {
        Command::Add {
            title,
            date,
            time,
            note,
            repeat,
        } => {
            let occurs_at = parse_date_time(&date, &time)?;
            let reminder = service.add(
                NewReminder::new(title, occurs_at)
                    .note(note)
                    .repeat(repeat.into()),
            )?;
            Ok(format!("Added reminder {}: {}\n", reminder.id, render_row(&reminder)))
        }
        Command::Edit {
            id,
            title,
            date,
            time,
            note,
            repeat,
            status,
        } => {
            let occurs_at = match (date, time) {
                (None, None) => None,
                (date, time) => {
                    // Fill whichever half was not given from the current value
                    let current = service.get(id).ok_or(AppError::NotFound(id))?;
                    let current_date = current.occurs_at.format("%Y-%m-%d").to_string();
                    let current_time = current.occurs_at.format("%H:%M").to_string();
                    Some(parse_date_time(
                        date.as_deref().unwrap_or(&current_date),
                        time.as_deref().unwrap_or(&current_time),
                    )?)
                }
            };
            let patch = ReminderPatch {
                title,
                occurs_at,
                note,
                repeat: repeat.map(Into::into),
                status: status.map(Into::into),
            };
            let reminder = service.edit(id, patch)?;
            Ok(format!("Updated reminder {}: {}\n", reminder.id, render_row(&reminder)))
        }
        Command::Delete { id } => {
            let removed = service.delete(id)?;
            Ok(format!("Deleted reminder {}: {}\n", id, removed.title))
        }
        Command::List => Ok(render_table("Upcoming Reminders", &service.list_upcoming())),
        Command::History => Ok(render_table("History", &service.list_history())),
        Command::Run => Ok("Scheduler is already running\n".to_string()),
    }
}

fn run_interactive(service: &ReminderService, config: &Config) -> AppResult<()> {
    let notifier = Arc::new(|title: &str, note: &str| {
        if note.is_empty() {
            println!("\nReminder! {}", title);
        } else {
            println!("\nReminder! {}\n\n{}", title, note);
        }
    });
    let handle = Scheduler::new(service.clone(), notifier, config.tick_interval())
        .on_refresh(|report: &TickReport| {
            if let Some(e) = &report.save_error {
                eprintln!("warning: {}", e);
            }
        })
        .spawn()?;

    println!(
        "{} reminders loaded. Type a command (add, edit, delete, list, history) or 'quit'.",
        service.len()
    );
    prompt();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            break;
        }
        if !line.is_empty() {
            match ShellLine::try_parse_from(split_words(line)) {
                Ok(parsed) => match execute(service, parsed.command) {
                    Ok(output) => print!("{}", output),
                    Err(e) => eprintln!("error: {}", e),
                },
                Err(e) => eprintln!("{}", e),
            }
        }
        prompt();
    }

    handle.stop()
}

fn prompt() {
    print!("reminder> ");
    let _ = io::stdout().flush();
}

/// Splits a prompt line on whitespace, keeping double-quoted runs together.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

fn render_row(reminder: &Reminder) -> String {
    let note = &reminder.note;
    let display_note = if note.chars().count() > NOTE_DISPLAY_LIMIT {
        format!("{}...", note.chars().take(NOTE_DISPLAY_LIMIT - 3).collect::<String>())
    } else {
        note.clone()
    };
    format!(
        "{}  {:<6}  {:<8}  {}{}",
        reminder.formatted_time(),
        reminder.repeat,
        reminder.status,
        reminder.title,
        if display_note.is_empty() {
            String::new()
        } else {
            format!("  ({})", display_note)
        }
    )
}

fn render_table(heading: &str, reminders: &[Reminder]) -> String {
    let mut out = format!("{}\n", heading);
    if reminders.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }
    for reminder in reminders {
        out.push_str(&format!("{:>4}  {}\n", reminder.id, render_row(reminder)));
    }
    out
}
