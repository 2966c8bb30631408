use crate::model::{AppData, Filter, Location};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Shiftwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub poll: PollConfig,
    pub tabs: TabsConfig,
    pub storage: StorageConfig,
}

/// Initial search preferences
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Locale sent with every request
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Country sent with every request
    #[serde(default = "default_country")]
    pub country: String,

    /// Wanted shift tags, most preferred first
    #[serde(default)]
    pub shifts: Vec<String>,

    #[serde(default)]
    pub shifts_prioritized: bool,

    /// Wanted cities, most preferred first
    #[serde(default)]
    pub cities: Vec<String>,

    #[serde(default)]
    pub cities_prioritized: bool,

    /// Optional geo clause
    pub location: Option<LocationConfig>,
}

impl SearchConfig {
    /// The preferences a fresh session starts with
    pub fn app_data(&self) -> AppData {
        AppData {
            filter: Filter {
                shifts: self.shifts.clone(),
                shifts_prioritized: self.shifts_prioritized,
                cities: self.cities.clone(),
                cities_prioritized: self.cities_prioritized,
            },
            location: self.location.map(|l| Location {
                lat: l.lat,
                lng: l.lng,
                commute_radius: l.commute_radius,
            }),
        }
    }
}

/// Search center and commute radius
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocationConfig {
    pub lat: f64,
    pub lng: f64,
    /// Radius in miles
    pub commute_radius: f64,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Job search endpoint
    pub endpoint: String,

    /// Schedule search endpoint (defaults to `endpoint`)
    pub schedule_endpoint: Option<String>,

    /// Page the acquisition redirects to
    pub apply_url: String,

    /// Bearer credential passed through unchanged
    pub bearer_token: Option<String>,

    /// Hard timeout per request (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn schedule_endpoint(&self) -> &str {
        self.schedule_endpoint.as_deref().unwrap_or(&self.endpoint)
    }
}

/// Poll loop timing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollConfig {
    /// First backoff delay after a failure (milliseconds)
    #[serde(default = "default_backoff_floor_ms")]
    pub backoff_floor_ms: u64,

    /// Largest backoff delay (milliseconds)
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Delay between successful polls that found nothing (milliseconds)
    #[serde(default = "default_delay_base_ms")]
    pub delay_base_ms: u64,

    /// Upper bound of the random extra delay (milliseconds)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// How long a tried job or schedule stays excluded (seconds)
    #[serde(default = "default_exhaustion_ttl_secs")]
    pub exhaustion_ttl_secs: u64,
}

impl PollConfig {
    pub fn exhaustion_ttl(&self) -> Duration {
        Duration::from_secs(self.exhaustion_ttl_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            backoff_floor_ms: default_backoff_floor_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            delay_base_ms: default_delay_base_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            exhaustion_ttl_secs: default_exhaustion_ttl_secs(),
        }
    }
}

/// Tab registration rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TabsConfig {
    /// Domain pattern a tab's URL must match (e.g. "*.hiring.example.com")
    pub target_domain: String,

    /// How recently a tab must have been active to count as a promotion candidate (milliseconds)
    #[serde(default = "default_active_window_ms")]
    pub active_window_ms: u64,
}

impl TabsConfig {
    pub fn active_window(&self) -> Duration {
        Duration::from_millis(self.active_window_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_country() -> String {
    "United States".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_backoff_floor_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_delay_base_ms() -> u64 {
    1000
}

fn default_delay_jitter_ms() -> u64 {
    500
}

fn default_exhaustion_ttl_secs() -> u64 {
    120
}

fn default_active_window_ms() -> u64 {
    300_000
}
