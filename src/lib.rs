//! Personal reminder scheduler.
//!
//! [`ReminderService`] is the thread-safe façade for adding, editing, deleting
//! and listing reminders. [`Scheduler`] runs the background due check over the
//! same collection, and [`ReminderStore`] persists it as one JSON file.

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod reminder;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use clock::{Clock, LocalClock, ManualClock};
pub use config::Config;
pub use error::{AppError, AppResult, ValidationError};
pub use reminder::{NewReminder, Reminder, ReminderId, ReminderPatch, Repeat, Status};
pub use scheduler::{Notifier, Scheduler, SchedulerHandle, TickReport};
pub use service::{ReminderService, TaskSync};
pub use storage::{LoadOutcome, ReminderStore};
