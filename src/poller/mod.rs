//! Poll loop
//!
//! This module contains the retrying poller that runs inside the active tab:
//! - Exponential backoff after failed polls
//! - Jittered delay between polls that found nothing
//! - The poll state machine that searches, filters, scores and acquires

mod backoff;
mod poll_loop;

pub use backoff::{idle_delay, Backoff};
pub use poll_loop::{Acquisition, PollLoop, PollSettings, PollState, PollStep, StopReason};
