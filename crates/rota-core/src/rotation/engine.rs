//! Staffing of a single release.
//!
//! The engine runs the selector once per discipline and charges every pick to
//! the weight ledger. A pick whose weight update fails is dropped from the
//! result; the remaining disciplines are still staffed.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use super::selector::{self, Selection};
use crate::error::Result;
use crate::roster::{Discipline, Engineer, Release, Role};
use crate::storage::traits::EngineerPool;

/// An engineer left out of (or not released from) a staffing because the
/// weight ledger could not be updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEngineer {
    pub engineer_id: String,
    pub role: Role,
    pub reason: String,
}

/// New staffing computed for one release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub primary: Vec<String>,
    pub backup: Vec<String>,
    /// Selections dropped because their weight update failed.
    pub skipped: Vec<SkippedEngineer>,
}

impl Assignment {
    fn push(&mut self, engineer: &Engineer, role: Role) {
        let set = match role {
            Role::Primary => &mut self.primary,
            Role::Backup => &mut self.backup,
        };
        if !set.contains(&engineer.id) {
            set.push(engineer.id.clone());
        }
    }
}

/// Orchestrates the selector across disciplines for one release.
#[derive(Clone)]
pub struct RotationEngine {
    pool: Arc<dyn EngineerPool>,
}

impl RotationEngine {
    pub fn new(pool: Arc<dyn EngineerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<dyn EngineerPool> {
        &self.pool
    }

    /// Pick a primary and backup per discipline for `release`.
    ///
    /// Engineers already holding a role on the release are not eligible.
    /// Each returned engineer's weight has been incremented by exactly one.
    /// Only a failure to list the pool aborts, and it does so before any
    /// weight is touched; weight failures are recorded in
    /// [`Assignment::skipped`].
    pub fn assign_engineers(&self, release: &Release) -> Result<Assignment> {
        let excluded: HashSet<String> = release
            .memberships()
            .map(|(id, _)| id.to_string())
            .collect();

        let mut pools = Vec::with_capacity(Discipline::ALL.len());
        for discipline in Discipline::ALL {
            pools.push((discipline, self.pool.list_by_discipline(discipline)?));
        }

        let mut assignment = Assignment::default();
        for (discipline, candidates) in pools {
            let Selection { primary, backup } = selector::select(&candidates, &excluded);

            for (picked, role) in [(primary, Role::Primary), (backup, Role::Backup)] {
                let Some(engineer) = picked else {
                    if role == Role::Backup && !candidates.is_empty() {
                        tracing::info!(
                            release = %release.name,
                            discipline = %discipline,
                            "no pod-diverse backup available"
                        );
                    }
                    continue;
                };
                match self.pool.adjust_weight(&engineer.id, 1) {
                    Ok(updated) => {
                        tracing::info!(
                            release = %release.name,
                            discipline = %discipline,
                            role = %role,
                            engineer = %updated.name,
                            weight = updated.weight,
                            "engineer assigned"
                        );
                        assignment.push(&updated, role);
                    }
                    Err(e) => {
                        tracing::warn!(
                            release = %release.name,
                            engineer_id = %engineer.id,
                            role = %role,
                            error = %e,
                            "weight update failed, leaving engineer out"
                        );
                        assignment.skipped.push(SkippedEngineer {
                            engineer_id: engineer.id.clone(),
                            role,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        Ok(assignment)
    }

    /// Roll back the weight contribution of `release`'s current staffing.
    ///
    /// Every member is decremented once. Members whose decrement fails (for
    /// example because they have left the pool) are returned; the caller is
    /// expected to clear the staffing regardless.
    pub fn release_staffing(&self, release: &Release) -> Vec<SkippedEngineer> {
        self.shift_staffing(release, -1, &[])
    }

    /// Charge `release`'s staffing back to the ledger after a rollback that
    /// could not be persisted. Members listed in `not_released` were never
    /// decremented and are left alone.
    pub fn reinstate_staffing(&self, release: &Release, not_released: &[SkippedEngineer]) -> Vec<SkippedEngineer> {
        self.shift_staffing(release, 1, not_released)
    }

    fn shift_staffing(&self, release: &Release, delta: i64, except: &[SkippedEngineer]) -> Vec<SkippedEngineer> {
        let mut failed = Vec::new();
        for (engineer_id, role) in release.memberships() {
            if except
                .iter()
                .any(|s| s.engineer_id == engineer_id && s.role == role)
            {
                continue;
            }
            if let Err(e) = self.pool.adjust_weight(engineer_id, delta) {
                tracing::warn!(
                    release = %release.name,
                    engineer_id,
                    role = %role,
                    delta,
                    error = %e,
                    "could not adjust weight for existing staffing"
                );
                failed.push(SkippedEngineer {
                    engineer_id: engineer_id.to_string(),
                    role,
                    reason: e.to_string(),
                });
            }
        }
        failed
    }
}
