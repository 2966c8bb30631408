//! Data model shared by the selection engine, the poller and the coordinator
//!
//! # Components
//!
//! - `ShiftTags`: ordered set of work-schedule labels parsed from the API
//! - `JobCandidate` / `ScheduleCandidate`: one poll's snapshot of results
//! - `Filter` / `AppData`: the user's preferences as they travel between contexts
//! - `SearchSession` / `TabRecord`: coordinator-owned state

mod filter;
mod job;
mod session;

pub use filter::{AppData, Filter, Location};
pub use job::{pair_key, JobCandidate, ScheduleCandidate, ShiftTags};
pub use session::{SearchSession, TabRecord};

/// Identifier of a browser tab (execution context)
pub type TabId = i64;
