//! Fairness-weighted, pod-diverse selection of one primary/backup pair.
//!
//! Candidates are bucketed by weight and scanned lowest bucket first. The
//! first eligible candidate becomes primary. The backup is the next eligible
//! candidate, continuing from the primary's position, whose pod differs from
//! the primary's. A same-pod backup is never chosen; no backup is returned
//! instead.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::roster::Engineer;

/// Outcome of one selection for a single discipline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub primary: Option<Engineer>,
    pub backup: Option<Engineer>,
}

/// Select a primary and backup from `candidates`, skipping anyone in `excluded`.
///
/// `candidates` should all share one discipline. Within a weight bucket the
/// order of `candidates` is preserved, so ties go to whoever comes first.
pub fn select(candidates: &[Engineer], excluded: &HashSet<String>) -> Selection {
    let mut buckets: BTreeMap<u32, Vec<&Engineer>> = BTreeMap::new();
    for engineer in candidates.iter().filter(|e| !excluded.contains(&e.id)) {
        buckets.entry(engineer.weight).or_default().push(engineer);
    }

    // Flattened ascending scan order; everything after the primary is the
    // remainder of its bucket followed by the heavier buckets.
    let mut scan = buckets.into_values().flatten();

    let Some(primary) = scan.next() else {
        return Selection::default();
    };

    let backup = scan
        .filter(|e| e.id != primary.id)
        .find(|e| e.pod != primary.pod);

    tracing::debug!(
        primary = %primary.name,
        backup = backup.map(|e| e.name.as_str()).unwrap_or("none"),
        "selection made"
    );

    Selection {
        primary: Some(primary.clone()),
        backup: backup.cloned(),
    }
}
