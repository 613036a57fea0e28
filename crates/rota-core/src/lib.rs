//! # Rota Core Library
//!
//! This library provides the core logic for rota, the on-call rotation tool
//! for releases. All operations are available through the `rota` CLI, which
//! is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Rotation**: a pure selector picks a fairness-weighted, pod-diverse
//!   primary/backup pair per discipline; the engine charges every pick to the
//!   weight ledger; the rebalancer recomputes every later release, oldest
//!   first, after any change
//! - **Storage**: SQLite-based roster storage and TOML-based configuration
//! - **Notify**: best-effort Slack reminders for assignees
//! - **Service**: the trigger operations (release add/edit, manual
//!   assign/remove, pool changes) tying the above together
//!
//! ## Key Components
//!
//! - [`RotationEngine`]: staffs a single release
//! - [`ScheduleRebalancer`]: keeps future releases consistent
//! - [`RosterDb`]: engineer pool, releases and reminders
//! - [`RotaService`]: trigger operations
//! - [`Config`]: application configuration management

pub mod error;
pub mod notify;
pub mod roster;
pub mod rota;
pub mod rotation;
pub mod storage;
pub mod validation;

pub use error::{ConfigError, CoreError, DatabaseError, NotifyError, ValidationError};
pub use notify::{LogNotifier, Notifier, Reminder, SlackNotifier};
pub use roster::{Discipline, Engineer, NewEngineer, Release, Role};
pub use rota::{OperationReport, RotaService, Warning};
pub use rotation::{Assignment, RotationEngine, ScheduleRebalancer, Selection, SkippedEngineer, StaffingChange};
pub use storage::{Config, EngineerPool, ReleaseStore, ReminderStore, RosterDb};
