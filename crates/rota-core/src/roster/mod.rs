//! Roster types: engineers in the pool and the releases they staff.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Engineering discipline. Every release is staffed once per discipline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    FrontEnd,
    BackEnd,
}

impl Discipline {
    /// All disciplines, in the order the engine staffs them.
    pub const ALL: [Discipline; 2] = [Discipline::FrontEnd, Discipline::BackEnd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::FrontEnd => "front_end",
            Discipline::BackEnd => "back_end",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Discipline::FrontEnd => "Front End",
            Discipline::BackEnd => "Back End",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Discipline {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "front_end" | "frontend" | "fe" => Ok(Discipline::FrontEnd),
            "back_end" | "backend" | "be" => Ok(Discipline::BackEnd),
            other => Err(ValidationError::InvalidValue {
                field: "discipline".into(),
                message: format!("unknown discipline '{other}' (expected front_end or back_end)"),
            }),
        }
    }
}

/// The role an engineer holds on a release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// On call
    Primary,
    Backup,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Backup => "backup",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "primary" | "on_call" => Ok(Role::Primary),
            "backup" => Ok(Role::Backup),
            other => Err(ValidationError::InvalidValue {
                field: "role".into(),
                message: format!("unknown role '{other}' (expected primary or backup)"),
            }),
        }
    }
}

/// A member of the on-call pool.
///
/// `weight` is the fairness ledger: the number of release roles currently
/// attributed to this engineer. It only changes through
/// [`EngineerPool::adjust_weight`](crate::storage::traits::EngineerPool::adjust_weight).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engineer {
    pub id: String,
    pub name: String,
    pub slack_id: Option<String>,
    pub discipline: Discipline,
    pub pod: String,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
}

/// Input for adding an engineer to the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEngineer {
    pub name: String,
    pub slack_id: Option<String>,
    pub discipline: Discipline,
    pub pod: String,
}

impl NewEngineer {
    pub fn new(name: impl Into<String>, discipline: Discipline, pod: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slack_id: None,
            discipline,
            pod: pod.into(),
        }
    }

    pub fn with_slack_id(mut self, slack_id: impl Into<String>) -> Self {
        self.slack_id = Some(slack_id.into());
        self
    }
}

/// A scheduled release and its on-call staffing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    /// Engineer ids on call, one per discipline at most when engine-assigned.
    pub primary: Vec<String>,
    /// Engineer ids on backup.
    pub backup: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// A release with no staffing yet.
    pub fn new(name: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            date,
            primary: Vec::new(),
            backup: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn members(&self, role: Role) -> &[String] {
        match role {
            Role::Primary => &self.primary,
            Role::Backup => &self.backup,
        }
    }

    /// The role `engineer_id` holds on this release, if any.
    pub fn role_of(&self, engineer_id: &str) -> Option<Role> {
        if self.primary.iter().any(|id| id == engineer_id) {
            Some(Role::Primary)
        } else if self.backup.iter().any(|id| id == engineer_id) {
            Some(Role::Backup)
        } else {
            None
        }
    }

    /// Every (engineer, role) membership, primaries first.
    pub fn memberships(&self) -> impl Iterator<Item = (&str, Role)> {
        self.primary
            .iter()
            .map(|id| (id.as_str(), Role::Primary))
            .chain(self.backup.iter().map(|id| (id.as_str(), Role::Backup)))
    }

    pub fn is_staffed(&self) -> bool {
        !self.primary.is_empty() || !self.backup.is_empty()
    }
}
