//! Trigger operations: everything that changes the pool or the schedule.
//!
//! Each operation persists its own change, rebalances the releases that come
//! after it and then notifies every engineer whose staffing moved.
//! Notification failures never undo a committed change; they come back as
//! [`Warning`]s on the [`OperationReport`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, NotifyError, Result};
use crate::notify::Notifier;
use crate::roster::{Engineer, NewEngineer, Release, Role};
use crate::rotation::{RotationEngine, ScheduleRebalancer, SkippedEngineer, StaffingChange};
use crate::storage::traits::{EngineerPool, ReleaseStore};
use crate::storage::RosterDb;

/// Something that went wrong without failing the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A notification could not be delivered.
    Notification {
        engineer_id: String,
        release: String,
        message: String,
    },
    /// A weight update failed, so the engineer was left out.
    WeightUpdate {
        engineer_id: String,
        release: String,
        role: Role,
        message: String,
    },
}

impl Warning {
    fn weight(release: &Release, skipped: SkippedEngineer) -> Self {
        Warning::WeightUpdate {
            engineer_id: skipped.engineer_id,
            release: release.name.clone(),
            role: skipped.role,
            message: skipped.reason,
        }
    }

    fn notification(engineer: &Engineer, release: &Release, err: &NotifyError) -> Self {
        Warning::Notification {
            engineer_id: engineer.id.clone(),
            release: release.name.clone(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Notification {
                engineer_id,
                release,
                message,
            } => write!(f, "could not notify {engineer_id} about {release}: {message}"),
            Warning::WeightUpdate {
                engineer_id,
                release,
                role,
                message,
            } => write!(
                f,
                "{engineer_id} left out as {role} on {release}: {message}"
            ),
        }
    }
}

/// Outcome of a trigger operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationReport {
    /// The release the operation targeted, as saved.
    pub release: Option<Release>,
    /// Later releases recomputed as a consequence, oldest first.
    pub rebalanced: Vec<Release>,
    pub warnings: Vec<Warning>,
}

/// Facade over storage, the rotation engine and the notifier.
pub struct RotaService {
    db: Arc<RosterDb>,
    rebalancer: ScheduleRebalancer,
    notifier: Arc<dyn Notifier>,
}

impl RotaService {
    pub fn new(db: Arc<RosterDb>, notifier: Arc<dyn Notifier>) -> Self {
        let engine = RotationEngine::new(db.clone());
        let rebalancer = ScheduleRebalancer::new(engine, db.clone());
        Self {
            db,
            rebalancer,
            notifier,
        }
    }

    pub fn db(&self) -> &Arc<RosterDb> {
        &self.db
    }

    pub fn rebalancer(&self) -> &ScheduleRebalancer {
        &self.rebalancer
    }

    fn release(&self, release_id: &str) -> Result<Release> {
        self.db
            .get_release(release_id)?
            .ok_or_else(|| CoreError::release_not_found(release_id))
    }

    fn engineer(&self, engineer_id: &str) -> Result<Engineer> {
        self.db
            .get_engineer(engineer_id)?
            .ok_or_else(|| CoreError::engineer_not_found(engineer_id))
    }

    // === Releases ===

    /// Create a release, staff it and rebalance everything after it.
    pub fn add_release(&self, name: &str, date: DateTime<Utc>) -> Result<OperationReport> {
        let created = self.db.create_release(&Release::new(name, date))?;
        tracing::info!(release = %created.name, date = %created.date, "release created");

        let change = self.rebalancer.recompute(created)?;
        let mut report = OperationReport::default();
        self.apply_change(&change, false, &mut report.warnings);
        report.release = Some(change.after);

        self.rebalance(date, &mut report)?;
        Ok(report)
    }

    /// Rename and/or move a release.
    ///
    /// Moving a release recomputes it at its new position together with
    /// every release after the earlier of its old and new dates. Its members
    /// get fresh reminders for the new date. A rename alone keeps the
    /// staffing but re-sends reminders, whose text names the release.
    pub fn edit_release(
        &self,
        release_id: &str,
        name: Option<&str>,
        date: Option<DateTime<Utc>>,
    ) -> Result<OperationReport> {
        let existing = self.release(release_id)?;
        let new_name = name.unwrap_or(&existing.name);
        let new_date = date.unwrap_or(existing.date);

        let updated = self.db.update_release(release_id, new_name, new_date)?;
        tracing::info!(
            release = %updated.name,
            from = %existing.date,
            to = %updated.date,
            "release edited"
        );

        let mut report = OperationReport::default();
        if updated.date == existing.date {
            if updated.name != existing.name {
                let renamed = StaffingChange {
                    before: updated.clone(),
                    after: updated,
                    skipped: Vec::new(),
                };
                self.apply_change(&renamed, true, &mut report.warnings);
                report.release = Some(renamed.after);
            } else {
                report.release = Some(updated);
            }
            return Ok(report);
        }

        let mut changes = Vec::new();
        if updated.date < existing.date {
            // Not covered by the rebalance below, which starts after the new date.
            changes.push(self.rebalancer.recompute(updated.clone())?);
        }
        changes.extend(self.rebalancer.rebalance_after(updated.date.min(existing.date))?);

        for change in changes {
            let is_edited = change.after.id == updated.id;
            self.apply_change(&change, is_edited, &mut report.warnings);
            if is_edited {
                report.release = Some(change.after);
            } else {
                report.rebalanced.push(change.after);
            }
        }
        Ok(report)
    }

    // === Manual overrides ===

    /// Put `engineer_id` on `release_id` as `role`, then rebalance later
    /// releases.
    pub fn assign_one(&self, release_id: &str, engineer_id: &str, role: Role) -> Result<OperationReport> {
        let release = self.release(release_id)?;
        let engineer = self.engineer(engineer_id)?;
        if release.role_of(&engineer.id).is_some() {
            return Err(CoreError::AlreadyAssigned {
                engineer_id: engineer.id,
                release: release.name,
            });
        }

        let engineer = self.db.adjust_weight(&engineer.id, 1)?;
        let updated = match self.db.add_member(&release.id, &engineer.id, role) {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(undo) = self.db.adjust_weight(&engineer.id, -1) {
                    tracing::error!(
                        engineer = %engineer.name,
                        error = %undo,
                        "could not undo weight after failed assignment"
                    );
                }
                return Err(e);
            }
        };
        tracing::info!(
            release = %updated.name,
            engineer = %engineer.name,
            role = %role,
            weight = engineer.weight,
            "engineer assigned manually"
        );

        let mut report = OperationReport::default();
        if let Err(e) = self.notifier.notify_assigned(&engineer, &updated, role) {
            self.warn_notify(&engineer, &updated, e, &mut report.warnings);
        }
        let date = updated.date;
        report.release = Some(updated);
        self.rebalance(date, &mut report)?;
        Ok(report)
    }

    /// Take `engineer_id` off `release_id`, then rebalance later releases.
    pub fn remove_one(&self, release_id: &str, engineer_id: &str, role: Role) -> Result<OperationReport> {
        let release = self.release(release_id)?;
        let engineer = self.engineer(engineer_id)?;
        if release.role_of(&engineer.id) != Some(role) {
            return Err(CoreError::NotFound {
                kind: "Assignment",
                id: format!("{} as {role} on {}", engineer.name, release.name),
            });
        }

        let engineer = self.db.adjust_weight(&engineer.id, -1)?;
        match self.db.remove_member(&release.id, &engineer.id, role) {
            Ok(true) => {}
            outcome => {
                if let Err(undo) = self.db.adjust_weight(&engineer.id, 1) {
                    tracing::error!(
                        engineer = %engineer.name,
                        error = %undo,
                        "could not undo weight after failed removal"
                    );
                }
                return Err(match outcome {
                    Err(e) => e,
                    _ => CoreError::NotFound {
                        kind: "Assignment",
                        id: format!("{} as {role} on {}", engineer.name, release.name),
                    },
                });
            }
        }
        let updated = self.release(release_id)?;
        tracing::info!(
            release = %updated.name,
            engineer = %engineer.name,
            role = %role,
            weight = engineer.weight,
            "engineer removed manually"
        );

        let mut report = OperationReport::default();
        if let Err(e) = self.notifier.notify_unassigned(&engineer, &updated) {
            self.warn_notify(&engineer, &updated, e, &mut report.warnings);
        }
        let date = updated.date;
        report.release = Some(updated);
        self.rebalance(date, &mut report)?;
        Ok(report)
    }

    // === Pool ===

    /// Add an engineer and rebalance every upcoming release.
    pub fn add_engineer(&self, new: &NewEngineer) -> Result<(Engineer, OperationReport)> {
        let engineer = self.db.create_engineer(new)?;
        tracing::info!(
            engineer = %engineer.name,
            discipline = %engineer.discipline,
            pod = %engineer.pod,
            "engineer added to pool"
        );

        let mut report = OperationReport::default();
        self.rebalance(Utc::now(), &mut report)?;
        let engineer = self.engineer(&engineer.id)?;
        Ok((engineer, report))
    }

    /// Remove an engineer and rebalance every upcoming release.
    pub fn remove_engineer(&self, engineer_id: &str) -> Result<OperationReport> {
        let engineer = self.engineer(engineer_id)?;
        let now = Utc::now();

        let mut report = OperationReport::default();
        // Reminders are looked up through the engineer, so cancel them first.
        for release in self.db.releases_for_engineer(&engineer.id, now)? {
            if let Err(e) = self.notifier.notify_unassigned(&engineer, &release) {
                self.warn_notify(&engineer, &release, e, &mut report.warnings);
            }
        }

        if !self.db.delete_engineer(&engineer.id)? {
            return Err(CoreError::engineer_not_found(engineer_id));
        }
        tracing::info!(engineer = %engineer.name, "engineer removed from pool");

        self.rebalance(now, &mut report)?;
        Ok(report)
    }

    // === Helpers ===

    fn rebalance(&self, pivot: DateTime<Utc>, report: &mut OperationReport) -> Result<()> {
        for change in self.rebalancer.rebalance_after(pivot)? {
            self.apply_change(&change, false, &mut report.warnings);
            report.rebalanced.push(change.after);
        }
        Ok(())
    }

    /// Turn a staffing change into notifications and warnings.
    ///
    /// With `renotify_all` every member is notified again, which is what a
    /// moved or renamed release needs since its reminders carry the old
    /// time and name.
    fn apply_change(&self, change: &StaffingChange, renotify_all: bool, warnings: &mut Vec<Warning>) {
        warnings.extend(
            change
                .skipped
                .iter()
                .cloned()
                .map(|skipped| Warning::weight(&change.after, skipped)),
        );

        let (removed, added) = if renotify_all {
            (
                owned_memberships(&change.before),
                owned_memberships(&change.after),
            )
        } else {
            (change.removed(), change.added())
        };

        for (engineer_id, _) in removed {
            let Some(engineer) = self.lookup_for_notify(&engineer_id) else {
                continue;
            };
            if let Err(e) = self.notifier.notify_unassigned(&engineer, &change.after) {
                self.warn_notify(&engineer, &change.after, e, warnings);
            }
        }
        for (engineer_id, role) in added {
            let Some(engineer) = self.lookup_for_notify(&engineer_id) else {
                continue;
            };
            if let Err(e) = self.notifier.notify_assigned(&engineer, &change.after, role) {
                self.warn_notify(&engineer, &change.after, e, warnings);
            }
        }
    }

    fn lookup_for_notify(&self, engineer_id: &str) -> Option<Engineer> {
        match self.db.get_engineer(engineer_id) {
            Ok(engineer) => engineer,
            Err(e) => {
                tracing::warn!(engineer_id, error = %e, "could not load engineer to notify");
                None
            }
        }
    }

    fn warn_notify(&self, engineer: &Engineer, release: &Release, err: NotifyError, warnings: &mut Vec<Warning>) {
        tracing::warn!(
            notifier = self.notifier.name(),
            engineer = %engineer.name,
            release = %release.name,
            error = %err,
            "notification failed"
        );
        warnings.push(Warning::notification(engineer, release, &err));
    }
}

fn owned_memberships(release: &Release) -> Vec<(String, Role)> {
    release
        .memberships()
        .map(|(id, role)| (id.to_string(), role))
        .collect()
}
