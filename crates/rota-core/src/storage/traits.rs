use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::notify::Reminder;
use crate::roster::{Discipline, Engineer, Release};

/// The pool of on-call engineers and their weight ledger.
///
/// Implementations must make [`adjust_weight`](EngineerPool::adjust_weight)
/// a single atomic read-modify-write: two triggers may adjust the same
/// engineer at once.
pub trait EngineerPool: Send + Sync {
    /// Engineers of one discipline, lightest first. Equal weights keep a
    /// stable order (the order engineers joined the pool).
    fn list_by_discipline(&self, discipline: Discipline) -> Result<Vec<Engineer>>;

    /// Add `delta` to the engineer's weight and return the updated record.
    ///
    /// Fails with `NotFound` for an unknown id and `WeightUnderflow` if the
    /// result would be negative.
    fn adjust_weight(&self, engineer_id: &str, delta: i64) -> Result<Engineer>;

    fn get_engineer(&self, engineer_id: &str) -> Result<Option<Engineer>>;
}

/// Scheduled releases and their staffing.
pub trait ReleaseStore: Send + Sync {
    fn get_release(&self, release_id: &str) -> Result<Option<Release>>;

    /// Releases dated strictly after `date`, oldest first.
    fn list_releases_after(&self, date: DateTime<Utc>) -> Result<Vec<Release>>;

    /// Replace the release's staffing with the given sets.
    fn save_assignment(&self, release_id: &str, primary: &[String], backup: &[String]) -> Result<Release>;
}

/// Bookkeeping for reminders created by a notifier.
pub trait ReminderStore: Send + Sync {
    fn record_reminder(&self, reminder: &Reminder) -> Result<()>;

    fn reminders_for(&self, engineer_id: &str, release_id: &str) -> Result<Vec<Reminder>>;

    fn delete_reminder(&self, id: &str) -> Result<()>;
}
