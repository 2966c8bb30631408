//! Multi-tab search coordination
//!
//! This module decides which of several open tabs may poll, including:
//! - Target-domain matching for tab registration
//! - The tab registry and its promotion order
//! - The message vocabulary shared by tabs and the coordinator
//! - The coordinator state machine and its actor front-end

mod handle;
mod matcher;
mod messages;
mod registry;
mod service;
mod transport;

pub use handle::{CoordinatorHandle, Envelope};
pub use matcher::{landing_url, matches_wildcard, url_matches_domain};
pub use messages::{Message, Reply};
pub use registry::TabRegistry;
pub use service::Coordinator;
pub use transport::{ChannelMessenger, TabMessenger};
