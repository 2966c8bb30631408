use serde::{Deserialize, Serialize};

/// Shift and city preferences applied to one poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Wanted shift tags, most preferred first
    #[serde(default)]
    pub shifts: Vec<String>,

    /// Whether the order of `shifts` matters
    #[serde(default)]
    pub shifts_prioritized: bool,

    /// Wanted city names, most preferred first
    #[serde(default)]
    pub cities: Vec<String>,

    /// Whether the order of `cities` matters
    #[serde(default)]
    pub cities_prioritized: bool,
}

impl Filter {
    /// Returns true if neither shifts nor cities constrain the search
    pub fn is_unconstrained(&self) -> bool {
        self.shifts.is_empty() && self.cities.is_empty()
    }
}

/// Search center and commute radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    /// Radius in miles
    pub commute_radius: f64,
}

/// User preferences propagated between the coordinator and tabs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(flatten)]
    pub filter: Filter,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}
