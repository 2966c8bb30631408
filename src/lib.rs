//! Shiftwatch: a polling shift finder
//!
//! This crate polls a hiring platform's search API for open jobs, scores the
//! returned candidates against the user's shift and city preferences, and
//! coordinates which of several registered browser tabs is allowed to poll at
//! any one time.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod exhaustion;
pub mod model;
pub mod poller;
pub mod selection;
pub mod storage;
pub mod tab;

use thiserror::Error;

/// Main error type for Shiftwatch operations
#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Errors raised while talking to the remote search API
///
/// Every variant is transient from the poll loop's point of view: it is
/// logged and turned into a backoff step, never into a loop exit.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    NetworkTimeout { operation: String, timeout_ms: u64 },

    #[error("{operation} failed: {source}")]
    NetworkFailure {
        operation: String,
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}")]
    HttpStatus { operation: String, status: u16 },

    #[error("Failed to build HTTP client: {0}")]
    Build(reqwest::Error),
}

/// Errors raised by the search coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No eligible tab is registered to run the search")]
    NoEligibleTab,

    #[error("Tab {tab_id} is unreachable")]
    UnreachableTab { tab_id: model::TabId },

    #[error("Tab {tab_id} is not on the target domain: {url}")]
    UrlRejected { tab_id: model::TabId, url: String },

    #[error("Message requires a sending tab")]
    MissingSender,

    #[error("Coordinator does not accept {0} messages")]
    UnsupportedMessage(&'static str),

    #[error("Unexpected reply to {request}: {reply}")]
    UnexpectedReply { request: &'static str, reply: String },

    #[error("Coordinator is shut down")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Result type alias for Shiftwatch operations
pub type Result<T> = std::result::Result<T, ShiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for remote client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result type alias for coordinator operations
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{AppData, Filter, JobCandidate, ScheduleCandidate, ShiftTags, TabId};
pub use selection::{select_best_job, select_schedule};
