use crate::error::ValidationError;
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire and display format for reminder timestamps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Record field the task planner uses to correlate its tasks with reminders.
pub const TASK_ID_FIELD: &str = "task_id";

/// Process-local surrogate identifier, assigned by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReminderId(u64);

impl ReminderId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReminderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    #[default]
    #[serde(rename = "None")]
    Never,
    Daily,
    Weekly,
}

impl Repeat {
    /// Fixed recurrence period, if any.
    pub fn period(self) -> Option<Duration> {
        match self {
            Repeat::Never => None,
            Repeat::Daily => Some(Duration::days(1)),
            Repeat::Weekly => Some(Duration::weeks(1)),
        }
    }

    pub fn is_recurring(self) -> bool {
        self.period().is_some()
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Repeat::Never => "None",
            Repeat::Daily => "Daily",
            Repeat::Weekly => "Weekly",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    Notified,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Status::Pending => "Pending",
            Status::Notified => "Notified",
        })
    }
}

/// A reminder as held in memory and written to disk.
///
/// Recurrence is a tag on the record rather than a separate type; see
/// [`Reminder::next_occurrence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(skip)]
    pub id: ReminderId, // Will be set by storage
    pub title: String,
    #[serde(rename = "datetime", with = "minute_format")]
    pub occurs_at: NaiveDateTime,
    pub repeat: Repeat,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    /// Fields written by collaborators (including the planner's `task_id`),
    /// carried through untouched whatever their type
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Reminder {
    pub fn new(title: String, occurs_at: NaiveDateTime, note: String, repeat: Repeat) -> Self {
        Self {
            id: ReminderId::default(),
            title,
            occurs_at: truncate_to_minute(occurs_at),
            repeat,
            note,
            status: Status::Pending,
            extra: serde_json::Map::new(),
        }
    }

    /// `occurs_at` advanced by one recurrence period, or `None` for one-shot reminders.
    pub fn next_occurrence(&self) -> Option<NaiveDateTime> {
        next_occurrence(self.occurs_at, self.repeat)
    }

    /// Exact-minute match against `now`; a lapsed occurrence never becomes due again.
    pub fn is_due_at(&self, now: NaiveDateTime) -> bool {
        self.status == Status::Pending && self.occurs_at == truncate_to_minute(now)
    }

    /// Pending and not yet reached.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.status == Status::Pending && self.occurs_at >= truncate_to_minute(now)
    }

    /// Post-delivery transition: reschedule recurring reminders, consume the rest.
    pub fn mark_fired(&mut self) {
        match self.next_occurrence() {
            Some(next) => {
                self.occurs_at = next;
                self.status = Status::Pending;
            }
            None => self.status = Status::Notified,
        }
    }

    pub fn formatted_time(&self) -> String {
        format_datetime(self.occurs_at)
    }

    /// The planner task this reminder belongs to. Keys of other shapes are
    /// kept on disk but never match.
    pub fn task_id(&self) -> Option<i64> {
        self.extra.get(TASK_ID_FIELD).and_then(serde_json::Value::as_i64)
    }

    pub fn set_task_id(&mut self, task_id: i64) {
        self.extra.insert(TASK_ID_FIELD.to_string(), task_id.into());
    }
}

pub fn next_occurrence(occurs_at: NaiveDateTime, repeat: Repeat) -> Option<NaiveDateTime> {
    repeat.period().and_then(|period| occurs_at.checked_add_signed(period))
}

/// Input for creating a reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub occurs_at: NaiveDateTime,
    pub note: String,
    pub repeat: Repeat,
}

impl NewReminder {
    pub fn new(title: impl Into<String>, occurs_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            occurs_at,
            note: String::new(),
            repeat: Repeat::Never,
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Checks title and, for brand-new reminders, that the time lies after `now`.
    pub fn validate(&self, now: NaiveDateTime, require_future: bool) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        let occurs_at = truncate_to_minute(self.occurs_at);
        if require_future && occurs_at <= now {
            return Err(ValidationError::PastDueInput(format_datetime(occurs_at)));
        }
        Ok(())
    }

    pub fn into_reminder(self) -> Reminder {
        Reminder::new(self.title.trim().to_string(), self.occurs_at, self.note, self.repeat)
    }
}

/// Field-wise replacement for an existing reminder. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub occurs_at: Option<NaiveDateTime>,
    pub note: Option<String>,
    pub repeat: Option<Repeat>,
    /// Status only changes when set here
    pub status: Option<Status>,
}

impl ReminderPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.occurs_at.is_none()
            && self.note.is_none()
            && self.repeat.is_none()
            && self.status.is_none()
    }

    /// Edits may move a reminder into the past; only the title is checked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    pub fn apply(self, reminder: &mut Reminder) {
        if let Some(title) = self.title {
            reminder.title = title.trim().to_string();
        }
        if let Some(occurs_at) = self.occurs_at {
            reminder.occurs_at = truncate_to_minute(occurs_at);
        }
        if let Some(note) = self.note {
            reminder.note = note;
        }
        if let Some(repeat) = self.repeat {
            reminder.repeat = repeat;
        }
        if let Some(status) = self.status {
            reminder.status = status;
        }
    }
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(dt)
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parses `YYYY-MM-DD HH:MM`.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, ValidationError> {
    NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT)
        .map_err(|_| ValidationError::InvalidDateTime(s.trim().to_string()))
}

/// Parses separate date (`YYYY-MM-DD`) and time (`HH:MM`) inputs.
pub fn parse_date_time(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    parse_datetime(&format!("{} {}", date.trim(), time.trim()))
}

/// Reads an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) mod minute_format {
    use super::DATETIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
