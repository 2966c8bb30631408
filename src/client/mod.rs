//! Remote client for the hiring platform's search API
//!
//! This module contains everything that knows the wire format:
//! - Building job and schedule search request bodies
//! - Decoding responses into `JobCandidate` / `ScheduleCandidate`
//! - Performing bounded-time HTTP calls
//!
//! Semicolon-joined tag strings never leave this module; they are parsed
//! into `ShiftTags` at decode time.

mod http;
mod request;
mod response;

pub use http::{acquisition_url, build_http_client, HttpJobSource, JobSource};
pub use request::{
    job_search_body, schedule_search_body, GeoQueryClause, JOB_PAGE_SIZE, SCHEDULE_PAGE_SIZE,
};
pub use response::{parse_job_cards, parse_schedule_cards};
