//! Best-effort notification of assignees.
//!
//! Notifications are sent only after staffing has been persisted. A failure
//! here is reported back as a warning and never undoes an assignment.

pub mod slack;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::roster::{Engineer, Release, Role};

pub use slack::SlackNotifier;

/// A reminder scheduled on behalf of an assignee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    pub engineer_id: String,
    pub release_id: String,
    /// Identifier returned by the Slack API.
    pub slack_reminder_id: String,
    pub remind_at: DateTime<Utc>,
}

/// Every notification channel implements this trait.
pub trait Notifier: Send + Sync {
    /// Unique identifier (e.g. "slack", "log").
    fn name(&self) -> &str;

    /// `engineer` now holds `role` on `release`.
    fn notify_assigned(&self, engineer: &Engineer, release: &Release, role: Role) -> Result<(), NotifyError>;

    /// `engineer` no longer holds a role on `release`.
    fn notify_unassigned(&self, engineer: &Engineer, release: &Release) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify_assigned(&self, engineer: &Engineer, release: &Release, role: Role) -> Result<(), NotifyError> {
        tracing::info!(
            engineer = %engineer.name,
            release = %release.name,
            date = %release.date,
            role = %role,
            "assignee notified"
        );
        Ok(())
    }

    fn notify_unassigned(&self, engineer: &Engineer, release: &Release) -> Result<(), NotifyError> {
        tracing::info!(
            engineer = %engineer.name,
            release = %release.name,
            "assignee released"
        );
        Ok(())
    }
}

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "rota";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
