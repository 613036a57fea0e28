//! The rotation engine: who is on call for which release.
//!
//! - [`selector`]: pure pick of a primary/backup pair for one discipline
//! - [`engine`]: staffs one release and charges the weight ledger
//! - [`rebalance`]: recomputes every later release after a change

pub mod engine;
pub mod rebalance;
pub mod selector;

pub use engine::{Assignment, RotationEngine, SkippedEngineer};
pub use rebalance::{ScheduleRebalancer, StaffingChange};
pub use selector::{select, Selection};
