use crate::clock::{Clock, LocalClock};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::reminder::{
    truncate_to_minute, validate_title, NewReminder, Reminder, ReminderId, ReminderPatch, Status,
};
use crate::storage::{LoadOutcome, ReminderStore, Storage};
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex, MutexGuard};

/// State shared by the service and the scheduler. Both go through
/// [`Shared::lock_storage`] for every read and write.
pub(crate) struct Shared {
    storage: Mutex<Storage>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    /// Lock storage, recovering from poison if needed
    pub(crate) fn lock_storage(&self) -> MutexGuard<'_, Storage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }
}

/// Thread-safe entry point for adding, editing, deleting and listing reminders.
///
/// Cloning is cheap; all clones operate on the same collection.
///
/// Mutations persist immediately. If the save fails the change stays in
/// memory, `Err(AppError::Storage)` is returned, and the next successful save
/// writes it out.
#[derive(Clone)]
pub struct ReminderService {
    shared: Arc<Shared>,
}

/// New values pushed by the task planner to its linked reminder.
#[derive(Debug, Clone)]
pub struct TaskSync {
    pub title: String,
    pub note: String,
    /// Leaves the reminder's time alone when `None`
    pub occurs_at: Option<NaiveDateTime>,
}

impl ReminderService {
    /// Opens the collection configured in `config` using the local wall clock.
    pub fn open(config: &Config) -> Self {
        Self::with_clock(ReminderStore::new(config.data_path()), Arc::new(LocalClock))
    }

    pub fn with_clock(store: ReminderStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage: Mutex::new(Storage::open(store)),
                clock,
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn now(&self) -> NaiveDateTime {
        self.shared.now()
    }

    // ============ Public API ============

    /// Validates and appends a new pending reminder. Its time must be in the future.
    pub fn add(&self, draft: NewReminder) -> AppResult<Reminder> {
        draft.validate(self.now(), true)?;

        let mut storage = self.shared.lock_storage();
        let reminder = storage.insert(draft.into_reminder());
        tracing::info!(
            id = %reminder.id,
            title = %reminder.title,
            at = %reminder.formatted_time(),
            repeat = %reminder.repeat,
            "reminder added"
        );
        storage.save()?;
        Ok(reminder)
    }

    /// Replaces fields in place. Past times are accepted and status only
    /// changes when the patch sets it.
    pub fn edit(&self, id: ReminderId, patch: ReminderPatch) -> AppResult<Reminder> {
        patch.validate()?;

        let mut storage = self.shared.lock_storage();
        let reminder = storage.get_mut(id).ok_or(AppError::NotFound(id))?;
        if patch.is_empty() {
            return Ok(reminder.clone());
        }
        patch.apply(reminder);
        let updated = reminder.clone();
        tracing::info!(id = %id, title = %updated.title, at = %updated.formatted_time(), "reminder edited");
        storage.save()?;
        Ok(updated)
    }

    pub fn delete(&self, id: ReminderId) -> AppResult<Reminder> {
        let mut storage = self.shared.lock_storage();
        let removed = storage.remove(id).ok_or(AppError::NotFound(id))?;
        tracing::info!(id = %id, title = %removed.title, "reminder deleted");
        storage.save()?;
        Ok(removed)
    }

    pub fn get(&self, id: ReminderId) -> Option<Reminder> {
        self.shared.lock_storage().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_storage().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock_storage().is_empty()
    }

    /// Every reminder in collection order.
    pub fn list_all(&self) -> Vec<Reminder> {
        self.shared.lock_storage().reminders().to_vec()
    }

    /// Pending reminders not yet reached, soonest first.
    pub fn list_upcoming(&self) -> Vec<Reminder> {
        let now = truncate_to_minute(self.now());
        let mut reminders: Vec<Reminder> = self
            .shared
            .lock_storage()
            .reminders()
            .iter()
            .filter(|r| r.is_upcoming(now))
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.occurs_at);
        reminders
    }

    /// Notified reminders plus pending ones whose time has passed unfired,
    /// in collection order.
    pub fn list_history(&self) -> Vec<Reminder> {
        let now = truncate_to_minute(self.now());
        self.shared
            .lock_storage()
            .reminders()
            .iter()
            .filter(|r| !r.is_upcoming(now))
            .cloned()
            .collect()
    }

    /// Re-reads the file, discarding the in-memory collection. IDs are reassigned.
    pub fn reload(&self) -> LoadOutcome {
        self.shared.lock_storage().reload()
    }

    /// Persists the current collection.
    pub fn save(&self) -> AppResult<()> {
        self.shared.lock_storage().save()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.shared.lock_storage().is_dirty()
    }

    // ============ Task links ============

    /// Attaches a reminder to a planner task, replacing any earlier one.
    /// Overdue tasks may be linked, so the time is not required to be in the future.
    pub fn link_task(&self, task_id: i64, draft: NewReminder) -> AppResult<Reminder> {
        draft.validate(self.now(), false)?;

        let mut storage = self.shared.lock_storage();
        let replaced = storage.remove_where(|r| r.task_id() == Some(task_id));
        let mut reminder = draft.into_reminder();
        reminder.set_task_id(task_id);
        let reminder = storage.insert(reminder);
        tracing::info!(task_id, id = %reminder.id, replaced = replaced.len(), "task reminder linked");
        storage.save()?;
        Ok(reminder)
    }

    /// Pushes task changes to linked reminders and re-arms them as pending.
    pub fn sync_task(&self, task_id: i64, sync: TaskSync) -> AppResult<usize> {
        validate_title(&sync.title)?;

        let mut storage = self.shared.lock_storage();
        let mut updated = 0;
        for reminder in storage.reminders_mut().filter(|r| r.task_id() == Some(task_id)) {
            reminder.title = sync.title.trim().to_string();
            reminder.note = sync.note.clone();
            if let Some(occurs_at) = sync.occurs_at {
                reminder.occurs_at = truncate_to_minute(occurs_at);
            }
            reminder.status = Status::Pending;
            updated += 1;
        }
        if updated > 0 {
            tracing::info!(task_id, updated, "task reminders synced");
            storage.save()?;
        }
        Ok(updated)
    }

    /// Deletes every reminder linked to the task.
    pub fn unlink_task(&self, task_id: i64) -> AppResult<usize> {
        let mut storage = self.shared.lock_storage();
        let removed = storage.remove_where(|r| r.task_id() == Some(task_id));
        if !removed.is_empty() {
            tracing::info!(task_id, removed = removed.len(), "task reminders unlinked");
            storage.save()?;
        }
        Ok(removed.len())
    }

    pub fn find_by_task(&self, task_id: i64) -> Option<Reminder> {
        self.shared
            .lock_storage()
            .reminders()
            .iter()
            .find(|r| r.task_id() == Some(task_id))
            .cloned()
    }
}
