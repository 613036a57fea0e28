//! Slack notifier -- schedules a reminder for each assignee ahead of the
//! release and deletes it again when they are taken off.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use super::keyring_store;
use super::{Notifier, Reminder};
use crate::error::NotifyError;
use crate::roster::{Engineer, Release, Role};
use crate::storage::{ReminderStore, SlackConfig};

const TOKEN_KEY: &str = "slack_token";
const TOKEN_ENV: &str = "ROTA_SLACK_TOKEN";

/// Reminder text sent to an assignee.
pub fn reminder_text(release: &Release, role: Role, offset_hours: u32) -> String {
    let when = match offset_hours {
        0 => "now".to_string(),
        1 => "in one hour".to_string(),
        n => format!("in {n} hours"),
    };
    let duty = match role {
        Role::Primary => "*on call*",
        Role::Backup => "on *backup*",
    };
    format!(
        "Release {} starts {when}. You're {duty} :slightly_smiling_face:",
        release.name
    )
}

pub struct SlackNotifier {
    token: String,
    api_base: String,
    offset_hours: u32,
    reminders: Arc<dyn ReminderStore>,
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl SlackNotifier {
    pub fn new(
        token: impl Into<String>,
        config: &SlackConfig,
        reminders: Arc<dyn ReminderStore>,
    ) -> Result<Self, NotifyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotifyError::Runtime(e.to_string()))?;
        Ok(Self {
            token: token.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            offset_hours: config.reminder_offset_hours,
            reminders,
            client: Client::new(),
            runtime,
        })
    }

    /// Build a notifier from the stored token (`ROTA_SLACK_TOKEN` wins over
    /// the keyring).
    pub fn from_stored_token(
        config: &SlackConfig,
        reminders: Arc<dyn ReminderStore>,
    ) -> Result<Self, NotifyError> {
        let token = Self::stored_token().ok_or(NotifyError::NotAuthenticated)?;
        Self::new(token, config, reminders)
    }

    pub fn stored_token() -> Option<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                return Some(token);
            }
        }
        keyring_store::get(TOKEN_KEY)
            .map_err(|e| tracing::warn!(error = %e, "could not read Slack token from keyring"))
            .ok()
            .flatten()
            .filter(|t| !t.is_empty())
    }

    /// Persist a token to the OS keyring.
    pub fn set_credentials(token: &str) -> Result<(), keyring::Error> {
        keyring_store::set(TOKEN_KEY, token)
    }

    /// Remove the stored token.
    pub fn disconnect() -> Result<(), keyring::Error> {
        keyring_store::delete(TOKEN_KEY)
    }

    /// Check the token against `auth.test`.
    pub fn verify(&self) -> Result<(), NotifyError> {
        self.call("auth.test", json!({})).map(|_| ())
    }

    fn call(&self, method: &str, body: Value) -> Result<Value, NotifyError> {
        if self.token.is_empty() {
            return Err(NotifyError::NotAuthenticated);
        }
        let url = format!("{}/api/{method}", self.api_base);
        let response: Value = self.runtime.block_on(async {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.token))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        })?;

        if response.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = response
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(NotifyError::Api {
                method: method.to_string(),
                error: error.to_string(),
            });
        }
        Ok(response)
    }

    fn remind_at(&self, release: &Release) -> DateTime<Utc> {
        release.date - Duration::hours(i64::from(self.offset_hours))
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn notify_assigned(&self, engineer: &Engineer, release: &Release, role: Role) -> Result<(), NotifyError> {
        let slack_id = engineer
            .slack_id
            .as_deref()
            .ok_or_else(|| NotifyError::MissingSlackId(engineer.name.clone()))?;
        let remind_at = self.remind_at(release);

        let body = self.call(
            "reminders.add",
            json!({
                "text": reminder_text(release, role, self.offset_hours),
                "time": remind_at.timestamp(),
                "user": slack_id,
            }),
        )?;
        let slack_reminder_id = body
            .pointer("/reminder/id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NotifyError::Api {
                method: "reminders.add".into(),
                error: "response carried no reminder id".into(),
            })?;

        self.reminders
            .record_reminder(&Reminder {
                id: Uuid::new_v4().to_string(),
                engineer_id: engineer.id.clone(),
                release_id: release.id.clone(),
                slack_reminder_id: slack_reminder_id.to_string(),
                remind_at,
            })
            .map_err(|e| NotifyError::Store(e.to_string()))?;

        tracing::info!(
            engineer = %engineer.name,
            release = %release.name,
            reminder = slack_reminder_id,
            "Slack reminder scheduled"
        );
        Ok(())
    }

    fn notify_unassigned(&self, engineer: &Engineer, release: &Release) -> Result<(), NotifyError> {
        let reminders = self
            .reminders
            .reminders_for(&engineer.id, &release.id)
            .map_err(|e| NotifyError::Store(e.to_string()))?;

        // Keep going after a failure so one stale reminder does not strand the rest.
        let mut first_error = None;
        for reminder in reminders {
            let deleted = self
                .call(
                    "reminders.delete",
                    json!({ "reminder": reminder.slack_reminder_id }),
                )
                .and_then(|_| {
                    self.reminders
                        .delete_reminder(&reminder.id)
                        .map_err(|e| NotifyError::Store(e.to_string()))
                });
            if let Err(e) = deleted {
                tracing::warn!(
                    engineer = %engineer.name,
                    release = %release.name,
                    reminder = %reminder.slack_reminder_id,
                    error = %e,
                    "could not delete Slack reminder"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_text_names_role() {
        let release = Release::new("18.9.1", Utc::now());
        assert_eq!(
            reminder_text(&release, Role::Primary, 1),
            "Release 18.9.1 starts in one hour. You're *on call* :slightly_smiling_face:"
        );
        assert!(reminder_text(&release, Role::Backup, 2).contains("in 2 hours. You're on *backup*"));
    }
}
