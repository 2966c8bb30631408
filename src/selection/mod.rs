//! Candidate selection
//!
//! Two pure selection stages run on every successful poll:
//! - `select_best_job`: ranks job candidates against a `Filter`
//! - `select_schedule`: picks a schedule for the chosen job
//!
//! Neither stage touches storage or the network. Callers remove exhausted
//! jobs before scoring and pass an exhaustion predicate to schedule selection.

mod schedule;
mod scoring;

pub use schedule::select_schedule;
pub use scoring::{score_candidate, select_best_job, Score};
