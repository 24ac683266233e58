//! Background due-check loop.
//!
//! Every tick takes the same storage lock the service uses, fires reminders
//! whose time equals the current minute, applies the post-delivery transition
//! and persists. Occurrences that pass while the process is down or blocked
//! are not fired late; they stay pending and show up in history.

use crate::error::{AppError, AppResult};
use crate::reminder::{truncate_to_minute, ReminderId};
use crate::service::ReminderService;
use chrono::NaiveDateTime;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Delivery callback supplied by the presentation layer.
///
/// Called on the scheduler thread while the collection is locked, once per
/// firing. Implementations must not call back into `ReminderService`; any UI
/// marshaling is theirs to do.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, note: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn notify(&self, title: &str, note: &str) {
        self(title, note)
    }
}

/// View-refresh listener, called after the lock is released.
pub type RefreshListener = Box<dyn Fn(&TickReport) + Send + Sync>;

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Minute the tick compared against
    pub now: NaiveDateTime,
    pub fired: Vec<ReminderId>,
    /// Set when the post-fire save failed; the fired state is kept in memory
    pub save_error: Option<AppError>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.fired.is_empty() && self.save_error.is_none()
    }
}

pub struct Scheduler {
    service: ReminderService,
    notifier: Arc<dyn Notifier>,
    listeners: Vec<RefreshListener>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(service: ReminderService, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        Self {
            service,
            notifier,
            listeners: Vec::new(),
            interval,
        }
    }

    /// Registers a listener invoked after any tick that fired or failed to save.
    pub fn on_refresh<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TickReport) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Runs one due check against the service clock.
    pub fn tick(&self) -> TickReport {
        self.tick_at(self.service.now())
    }

    /// Runs one due check as if the wall clock read `now`.
    pub fn tick_at(&self, now: NaiveDateTime) -> TickReport {
        let now = truncate_to_minute(now);
        let mut fired = Vec::new();
        let mut save_error = None;

        {
            let shared = self.service.shared();
            let mut storage = shared.lock_storage();
            for reminder in storage.reminders_mut() {
                if !reminder.is_due_at(now) {
                    continue;
                }

                self.notifier.notify(&reminder.title, &reminder.note);
                tracing::info!(id = %reminder.id, title = %reminder.title, "reminder fired");

                reminder.mark_fired();
                if reminder.repeat.is_recurring() {
                    tracing::debug!(id = %reminder.id, next = %reminder.formatted_time(), "recurring reminder rescheduled");
                }
                fired.push(reminder.id);
            }

            if !fired.is_empty() {
                // Already logged by storage; the loop keeps going
                save_error = storage.save().err();
            }
        }

        let report = TickReport {
            now,
            fired,
            save_error,
        };
        if !report.is_idle() {
            for listener in &self.listeners {
                listener(&report);
            }
        }
        report
    }

    /// Moves the loop onto its own thread. Ticks immediately, then once per interval.
    pub fn spawn(self) -> AppResult<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let service = self.service.clone();
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name("reminder-scheduler".into())
            .spawn(move || {
                tracing::info!(interval_secs = interval.as_secs(), "scheduler started");
                loop {
                    self.tick();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!("scheduler loop exited");
            })
            .map_err(|e| AppError::scheduler(format!("failed to spawn scheduler thread: {}", e)))?;

        Ok(SchedulerHandle {
            stop_tx,
            thread,
            service,
        })
    }
}

/// Owner of a running scheduler thread.
pub struct SchedulerHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    service: ReminderService,
}

impl SchedulerHandle {
    /// Stops the loop: no new tick starts, an in-flight tick finishes, then the
    /// collection is saved one last time.
    pub fn stop(self) -> AppResult<()> {
        // A send error only means the thread is already gone
        let _ = self.stop_tx.send(());
        if self.thread.join().is_err() {
            tracing::error!("scheduler thread panicked");
        }

        let result = self.service.save();
        match &result {
            Ok(()) => tracing::info!("scheduler stopped, reminders saved"),
            Err(e) => tracing::error!(error = %e, "final save failed"),
        }
        result
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::reminder::{parse_datetime, NewReminder, Repeat, Status};
    use crate::storage::ReminderStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn at(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    struct Recorder {
        delivered: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, title: &str, note: &str) {
            self.delivered
                .lock()
                .unwrap()
                .push((title.to_string(), note.to_string()));
        }
    }

    fn setup(now: &str) -> (TempDir, Arc<ManualClock>, ReminderService, Arc<Recorder>) {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(at(now)));
        let service = ReminderService::with_clock(
            ReminderStore::new(temp.path().join("reminders.json")),
            clock.clone(),
        );
        let recorder = Arc::new(Recorder {
            delivered: Mutex::new(Vec::new()),
        });
        (temp, clock, service, recorder)
    }

    #[test]
    fn test_one_shot_fires_once_then_notified() {
        let (_temp, _clock, service, recorder) = setup("2025-01-01 08:00");
        let added = service
            .add(NewReminder::new("Dentist", at("2025-01-01 09:00")).note("bring card"))
            .unwrap();
        let scheduler = Scheduler::new(service.clone(), recorder.clone(), Duration::from_secs(30));

        let report = scheduler.tick_at(at("2025-01-01 09:00") + chrono::Duration::seconds(20));
        assert_eq!(report.fired, vec![added.id]);
        assert!(report.save_error.is_none());
        assert_eq!(service.get(added.id).unwrap().status, Status::Notified);

        // Same minute, then later: no re-fire
        assert!(scheduler.tick_at(at("2025-01-01 09:00")).fired.is_empty());
        assert!(scheduler.tick_at(at("2025-01-01 09:01")).fired.is_empty());

        let delivered = recorder.delivered.lock().unwrap();
        assert_eq!(*delivered, vec![("Dentist".to_string(), "bring card".to_string())]);
    }

    #[test]
    fn test_daily_reschedules_and_fires_again() {
        let (_temp, _clock, service, recorder) = setup("2024-12-31 08:00");
        let added = service
            .add(NewReminder::new("Pills", at("2025-01-01 09:00")).repeat(Repeat::Daily))
            .unwrap();
        let scheduler = Scheduler::new(service.clone(), recorder.clone(), Duration::from_secs(30));

        scheduler.tick_at(at("2025-01-01 09:00"));
        let after = service.get(added.id).unwrap();
        assert_eq!(after.occurs_at, at("2025-01-02 09:00"));
        assert_eq!(after.status, Status::Pending);

        assert_eq!(scheduler.tick_at(at("2025-01-02 09:00")).fired, vec![added.id]);
        assert_eq!(service.get(added.id).unwrap().occurs_at, at("2025-01-03 09:00"));
        assert_eq!(recorder.delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_missed_minute_is_not_fired_late() {
        let (_temp, clock, service, recorder) = setup("2025-01-01 08:00");
        let added = service.add(NewReminder::new("Standup", at("2025-01-01 09:00"))).unwrap();
        let scheduler = Scheduler::new(service.clone(), recorder.clone(), Duration::from_secs(30));

        // The process was not ticking at 09:00
        let report = scheduler.tick_at(at("2025-01-01 09:05"));
        assert!(report.fired.is_empty());
        assert!(recorder.delivered.lock().unwrap().is_empty());

        clock.set(at("2025-01-01 09:05"));
        let history = service.list_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, added.id);
        assert_eq!(history[0].status, Status::Pending);
    }

    #[test]
    fn test_fired_state_is_persisted() {
        let (temp, _clock, service, recorder) = setup("2025-01-01 08:00");
        service
            .add(NewReminder::new("Weekly review", at("2025-01-03 17:00")).repeat(Repeat::Weekly))
            .unwrap();
        let scheduler = Scheduler::new(service, recorder, Duration::from_secs(30));
        scheduler.tick_at(at("2025-01-03 17:00"));

        let on_disk = ReminderStore::new(temp.path().join("reminders.json")).load();
        assert_eq!(on_disk[0].occurs_at, at("2025-01-10 17:00"));
        assert_eq!(on_disk[0].status, Status::Pending);
    }

    #[test]
    fn test_listener_runs_only_when_something_happened() {
        let (_temp, _clock, service, recorder) = setup("2025-01-01 08:00");
        service.add(NewReminder::new("Call", at("2025-01-01 09:00"))).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let listener_service = service.clone();
        let scheduler = Scheduler::new(service, recorder, Duration::from_secs(30)).on_refresh(
            move |report| {
                // Listeners may query the service; the lock is released
                assert!(listener_service.list_all().len() >= report.fired.len());
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );

        scheduler.tick_at(at("2025-01-01 08:59"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        scheduler.tick_at(at("2025-01-01 09:00"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_notifier() {
        let (_temp, _clock, service, _recorder) = setup("2025-01-01 08:00");
        service.add(NewReminder::new("Tea", at("2025-01-01 16:00"))).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let notifier = move |title: &str, _note: &str| {
            assert_eq!(title, "Tea");
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let scheduler = Scheduler::new(service, Arc::new(notifier), Duration::from_secs(30));
        scheduler.tick_at(at("2025-01-01 16:00"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawn_and_stop_saves() {
        let (temp, clock, service, recorder) = setup("2025-01-01 08:00");
        service.add(NewReminder::new("Now", at("2025-01-01 08:01"))).unwrap();
        clock.set(at("2025-01-01 08:01"));

        let handle = Scheduler::new(service.clone(), recorder.clone(), Duration::from_millis(10))
            .spawn()
            .unwrap();
        assert!(handle.is_running());
        // First tick runs immediately on start
        for _ in 0..200 {
            if !recorder.delivered.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        handle.stop().unwrap();

        assert_eq!(recorder.delivered.lock().unwrap().len(), 1);
        let on_disk = ReminderStore::new(temp.path().join("reminders.json")).load();
        assert_eq!(on_disk[0].status, Status::Notified);
    }
}
