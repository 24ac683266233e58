use crate::error::{AppError, AppResult};
use crate::reminder::Reminder;
use crate::storage::record::{decode_collection, encode_collection};
use std::fs;
use std::path::{Path, PathBuf};

/// What a load found on disk.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub reminders: Vec<Reminder>,
    /// Individual records skipped as malformed
    pub dropped: usize,
    /// The whole file was unreadable and nothing was loaded from it
    pub corrupt: bool,
}

/// Whole-collection persistence to a single JSON file.
#[derive(Debug, Clone)]
pub struct ReminderStore {
    path: PathBuf,
}

impl ReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads reminders, treating a missing or corrupt file as empty.
    pub fn load(&self) -> Vec<Reminder> {
        self.load_outcome().reminders
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        if !self.path.exists() {
            return LoadOutcome::default();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read reminders");
                return LoadOutcome {
                    corrupt: true,
                    ..Default::default()
                };
            }
        };

        match decode_collection(&content) {
            Ok(decoded) => {
                tracing::info!(
                    path = %self.path.display(),
                    loaded = decoded.reminders.len(),
                    dropped = decoded.dropped,
                    "loaded reminders"
                );
                LoadOutcome {
                    reminders: decoded.reminders,
                    dropped: decoded.dropped,
                    corrupt: false,
                }
            }
            Err(reason) => {
                // The file is left as is; a copy is kept in case a later save overwrites it
                let backup = self.backup_path();
                match fs::write(&backup, &content) {
                    Ok(()) => tracing::warn!(
                        path = %self.path.display(),
                        backup = %backup.display(),
                        %reason,
                        "reminder file is corrupt, starting empty"
                    ),
                    Err(e) => tracing::warn!(
                        path = %self.path.display(),
                        %reason,
                        error = %e,
                        "reminder file is corrupt and could not be backed up"
                    ),
                }
                LoadOutcome {
                    corrupt: true,
                    ..Default::default()
                }
            }
        }
    }

    /// Overwrites the file with the full collection.
    pub fn save(&self, reminders: &[Reminder]) -> AppResult<()> {
        let content = encode_collection(reminders).map_err(AppError::storage)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AppError::storage(e.to_string()))?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, content)
            .map_err(|e| AppError::storage(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::storage(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "corrupt")
    }

    fn tmp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{parse_datetime, Repeat, Status};
    use tempfile::TempDir;

    fn sample(title: &str, at: &str, repeat: Repeat) -> Reminder {
        Reminder::new(title.to_string(), parse_datetime(at).unwrap(), String::new(), repeat)
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp = TempDir::new().unwrap();
        let store = ReminderStore::new(temp.path().join("reminders.json"));

        let outcome = store.load_outcome();
        assert!(outcome.reminders.is_empty());
        assert!(!outcome.corrupt);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = ReminderStore::new(temp.path().join("nested").join("reminders.json"));

        let mut done = sample("Water plants", "2025-01-01 08:00", Repeat::Never);
        done.status = Status::Notified;
        let reminders = vec![sample("Standup", "2025-01-02 09:30", Repeat::Daily), done];

        store.save(&reminders).unwrap();
        let loaded = store.load();

        assert_eq!(loaded, reminders);
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_save_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = ReminderStore::new(temp.path().join("reminders.json"));
        store
            .save(&[sample("Standup", "2025-01-02 09:30", Repeat::Weekly)])
            .unwrap();
        let first = fs::read_to_string(store.path()).unwrap();

        store.save(&store.load()).unwrap();
        store.save(&store.load()).unwrap();
        let third = fs::read_to_string(store.path()).unwrap();

        assert_eq!(first, third);
    }

    #[test]
    fn test_corrupt_file_loads_empty_and_is_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reminders.json");
        fs::write(&path, "{ this is not json").unwrap();
        let store = ReminderStore::new(&path);

        let outcome = store.load_outcome();
        assert!(outcome.corrupt);
        assert!(outcome.reminders.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
        assert_eq!(
            fs::read_to_string(store.backup_path()).unwrap(),
            "{ this is not json"
        );
    }

    #[test]
    fn test_save_into_unwritable_location_reports_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();
        let store = ReminderStore::new(blocker.join("reminders.json"));

        let err = store.save(&[]).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
