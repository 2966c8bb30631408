//! Configuration module for Shiftwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shiftwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("shiftwatch.toml")).unwrap();
//! println!("Polling {}", config.client.endpoint);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClientConfig, Config, LocationConfig, PollConfig, SearchConfig, StorageConfig, TabsConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
