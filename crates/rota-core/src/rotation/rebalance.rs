//! Forward propagation of staffing after a pool or schedule change.
//!
//! Releases after the pivot are recomputed one at a time, oldest first. Each
//! recomputation moves weights, and those weights are the input of the next
//! release, so the loop must stay sequential.
//!
//! A release's previous staffing is rolled back before it is recomputed
//! (zero-and-recompute), which keeps every weight equal to the number of
//! roles the engineer currently holds no matter how often a release is
//! rebalanced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::engine::{RotationEngine, SkippedEngineer};
use crate::error::{CoreError, Result};
use crate::roster::{Release, Role};
use crate::storage::traits::ReleaseStore;

/// Staffing of one release before and after a rebalance.
#[derive(Debug, Clone, Serialize)]
pub struct StaffingChange {
    pub before: Release,
    pub after: Release,
    pub skipped: Vec<SkippedEngineer>,
}

impl StaffingChange {
    /// Memberships present after but not before.
    pub fn added(&self) -> Vec<(String, Role)> {
        diff(&self.after, &self.before)
    }

    /// Memberships present before but not after.
    pub fn removed(&self) -> Vec<(String, Role)> {
        diff(&self.before, &self.after)
    }

    pub fn is_unchanged(&self) -> bool {
        self.added().is_empty() && self.removed().is_empty()
    }
}

fn diff(left: &Release, right: &Release) -> Vec<(String, Role)> {
    left.memberships()
        .filter(|(id, role)| right.role_of(id) != Some(*role))
        .map(|(id, role)| (id.to_string(), role))
        .collect()
}

/// Re-runs the rotation engine over every release after a change.
#[derive(Clone)]
pub struct ScheduleRebalancer {
    engine: RotationEngine,
    releases: Arc<dyn ReleaseStore>,
}

impl ScheduleRebalancer {
    pub fn new(engine: RotationEngine, releases: Arc<dyn ReleaseStore>) -> Self {
        Self { engine, releases }
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    /// Recompute every release dated after `changed` and return them as saved.
    pub fn update_future_releases(&self, changed: &Release) -> Result<Vec<Release>> {
        Ok(self
            .rebalance_after(changed.date)?
            .into_iter()
            .map(|change| change.after)
            .collect())
    }

    /// Recompute every release dated strictly after `pivot`, oldest first.
    ///
    /// Each release is persisted before the next one is computed. A failed
    /// save stops the pipeline: later releases would otherwise be computed
    /// against weights that no longer match stored staffing.
    pub fn rebalance_after(&self, pivot: DateTime<Utc>) -> Result<Vec<StaffingChange>> {
        let upcoming = self.releases.list_releases_after(pivot)?;
        tracing::debug!(pivot = %pivot, count = upcoming.len(), "rebalancing releases");

        let mut changes = Vec::with_capacity(upcoming.len());
        for release in upcoming {
            changes.push(self.recompute(release)?);
        }
        Ok(changes)
    }

    /// Roll back, reassign and persist a single release.
    ///
    /// Staffing is re-read from the store before the rollback, so the
    /// ledger is debited for what is saved rather than for a snapshot taken
    /// earlier in the loop. When the new staffing cannot be computed or
    /// saved, the ledger is put back to match the stored staffing before
    /// the error is returned.
    pub fn recompute(&self, release: Release) -> Result<StaffingChange> {
        let release = self
            .releases
            .get_release(&release.id)?
            .ok_or_else(|| CoreError::release_not_found(&release.id))?;

        let not_released = self.engine.release_staffing(&release);

        let mut cleared = release.clone();
        cleared.primary.clear();
        cleared.backup.clear();

        let assignment = match self.engine.assign_engineers(&cleared) {
            Ok(assignment) => assignment,
            Err(e) => {
                self.restore(&release, &not_released, None);
                return Err(e);
            }
        };

        let after = match self
            .releases
            .save_assignment(&release.id, &assignment.primary, &assignment.backup)
        {
            Ok(after) => after,
            Err(e) => {
                tracing::warn!(release = %release.name, error = %e, "could not save staffing, restoring weights");
                let mut picked = cleared;
                picked.primary = assignment.primary;
                picked.backup = assignment.backup;
                self.restore(&release, &not_released, Some(&picked));
                return Err(e);
            }
        };

        tracing::info!(
            release = %after.name,
            date = %after.date,
            primary = after.primary.len(),
            backup = after.backup.len(),
            "release rebalanced"
        );

        let mut skipped = not_released;
        skipped.extend(assignment.skipped);
        Ok(StaffingChange {
            before: release,
            after,
            skipped,
        })
    }

    /// Undo an unsaved recomputation: release the new picks, then charge
    /// the stored staffing again.
    fn restore(&self, stored: &Release, not_released: &[SkippedEngineer], picked: Option<&Release>) {
        let mut failed = picked
            .map(|p| self.engine.release_staffing(p))
            .unwrap_or_default();
        failed.extend(self.engine.reinstate_staffing(stored, not_released));
        if !failed.is_empty() {
            tracing::error!(
                release = %stored.name,
                engineers = failed.len(),
                "weights could not be restored after a failed rebalance"
            );
        }
    }
}
