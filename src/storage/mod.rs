mod local;
mod record;

use crate::error::AppResult;
use crate::reminder::{Reminder, ReminderId};

pub use local::{LoadOutcome, ReminderStore};

/// The in-memory reminder collection and its single persistence path.
///
/// Callers serialize access through one lock (see `ReminderService`); every
/// write to disk goes through [`Storage::save`].
pub struct Storage {
    reminders: Vec<Reminder>,
    store: ReminderStore,
    next_id: u64,
    dirty: bool,
}

impl Storage {
    /// Loads the collection from `store` and assigns fresh IDs in file order.
    pub fn open(store: ReminderStore) -> Self {
        let mut storage = Self {
            reminders: Vec::new(),
            store,
            next_id: 1,
            dirty: false,
        };
        storage.reload();
        storage
    }

    /// Replaces the in-memory collection with what is on disk.
    pub fn reload(&mut self) -> LoadOutcome {
        let mut outcome = self.store.load_outcome();
        self.reminders.clear();
        for mut reminder in outcome.reminders.drain(..) {
            reminder.id = self.next_id();
            self.reminders.push(reminder);
        }
        self.dirty = false;
        outcome.reminders = self.reminders.clone();
        outcome
    }

    fn next_id(&mut self) -> ReminderId {
        let id = ReminderId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn store(&self) -> &ReminderStore {
        &self.store
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn reminders_mut(&mut self) -> impl Iterator<Item = &mut Reminder> {
        self.reminders.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn get(&self, id: ReminderId) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: ReminderId) -> Option<&mut Reminder> {
        self.reminders.iter_mut().find(|r| r.id == id)
    }

    /// Appends a reminder and returns a copy carrying its new ID.
    pub fn insert(&mut self, mut reminder: Reminder) -> Reminder {
        reminder.id = self.next_id();
        self.reminders.push(reminder.clone());
        reminder
    }

    pub fn remove(&mut self, id: ReminderId) -> Option<Reminder> {
        let pos = self.reminders.iter().position(|r| r.id == id)?;
        Some(self.reminders.remove(pos))
    }

    /// Removes every reminder matching `pred`, returning them in order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<Reminder>
    where
        F: FnMut(&Reminder) -> bool,
    {
        let (removed, kept): (Vec<Reminder>, Vec<Reminder>) =
            self.reminders.drain(..).partition(|r| pred(r));
        self.reminders = kept;
        removed
    }

    /// Unsaved changes exist because the last save failed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the whole collection. On failure the in-memory state is kept
    /// and marked dirty until a later save succeeds.
    pub fn save(&mut self) -> AppResult<()> {
        match self.store.save(&self.reminders) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                tracing::error!(path = %self.store.path().display(), error = %e, "failed to save reminders");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{parse_datetime, Repeat};
    use std::fs;
    use tempfile::TempDir;

    fn create_test_reminder(title: &str) -> Reminder {
        Reminder::new(
            title.to_string(),
            parse_datetime("2025-01-01 09:00").unwrap(),
            String::new(),
            Repeat::Never,
        )
    }

    #[test]
    fn test_ids_are_stable_across_removal() {
        let temp = TempDir::new().unwrap();
        let mut storage = Storage::open(ReminderStore::new(temp.path().join("reminders.json")));

        let a = storage.insert(create_test_reminder("a"));
        let b = storage.insert(create_test_reminder("b"));
        let c = storage.insert(create_test_reminder("c"));

        storage.remove(a.id).unwrap();
        assert_eq!(storage.get(b.id).unwrap().title, "b");
        assert_eq!(storage.get(c.id).unwrap().title, "c");

        // IDs are never reused within a process
        let d = storage.insert(create_test_reminder("d"));
        assert!(d.id > c.id);
    }

    #[test]
    fn test_open_assigns_ids_in_file_order() {
        let temp = TempDir::new().unwrap();
        let store = ReminderStore::new(temp.path().join("reminders.json"));
        store
            .save(&[create_test_reminder("first"), create_test_reminder("second")])
            .unwrap();

        let storage = Storage::open(store);
        let ids: Vec<u64> = storage.reminders().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(storage.reminders()[1].title, "second");
    }

    #[test]
    fn test_failed_save_marks_dirty_then_recovers() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        fs::write(&dir, "blocking file").unwrap();
        let mut storage = Storage::open(ReminderStore::new(dir.join("reminders.json")));

        storage.insert(create_test_reminder("kept in memory"));
        assert!(storage.save().is_err());
        assert!(storage.is_dirty());
        assert_eq!(storage.len(), 1);

        fs::remove_file(&dir).unwrap();
        storage.save().unwrap();
        assert!(!storage.is_dirty());
        assert_eq!(storage.store().load().len(), 1);
    }

    #[test]
    fn test_remove_where_returns_removed() {
        let temp = TempDir::new().unwrap();
        let mut storage = Storage::open(ReminderStore::new(temp.path().join("reminders.json")));
        let mut linked = create_test_reminder("linked");
        linked.set_task_id(4);
        storage.insert(linked);
        storage.insert(create_test_reminder("plain"));

        let removed = storage.remove_where(|r| r.task_id() == Some(4));
        assert_eq!(removed.len(), 1);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.reminders()[0].title, "plain");
    }
}
