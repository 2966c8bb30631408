//! Response decoding
//!
//! A body that does not decode is treated as an empty result: the poll loop
//! logs it and tries again on its normal schedule.

use crate::model::{JobCandidate, ScheduleCandidate, ShiftTags};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobSearchData {
    search_job_cards_by_location: Option<JobCards>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCards {
    #[serde(default)]
    job_cards: Vec<JobCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCard {
    job_id: Option<String>,
    job_type: Option<String>,
    location_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleSearchData {
    search_schedule_cards: Option<ScheduleCards>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleCards {
    #[serde(default)]
    schedule_cards: Vec<ScheduleCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleCard {
    schedule_id: Option<String>,
    schedule_type: Option<String>,
    hours_per_week: Option<serde_json::Value>,
}

/// Decodes a job search response
///
/// `original_index` is the card's position in the response. Cards without a
/// job id are dropped.
pub fn parse_job_cards(body: &str) -> Vec<JobCandidate> {
    let response: GraphQlResponse<JobSearchData> = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Malformed job search response: {}", e);
            return Vec::new();
        }
    };

    let Some(cards) = response.data.and_then(|d| d.search_job_cards_by_location) else {
        tracing::warn!("Job search response has no data");
        return Vec::new();
    };

    cards
        .job_cards
        .into_iter()
        .enumerate()
        .filter_map(|(index, card)| {
            let id = card.job_id.filter(|id| !id.is_empty())?;
            Some(JobCandidate::new(
                id,
                ShiftTags::parse(card.job_type.as_deref().unwrap_or("")),
                card.location_name.unwrap_or_default(),
                index,
            ))
        })
        .collect()
}

/// Decodes a schedule search response for `job_id`
pub fn parse_schedule_cards(job_id: &str, body: &str) -> Vec<ScheduleCandidate> {
    let response: GraphQlResponse<ScheduleSearchData> = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%job_id, "Malformed schedule search response: {}", e);
            return Vec::new();
        }
    };

    let Some(cards) = response.data.and_then(|d| d.search_schedule_cards) else {
        tracing::warn!(%job_id, "Schedule search response has no data");
        return Vec::new();
    };

    cards
        .schedule_cards
        .into_iter()
        .filter_map(|card| {
            let schedule_id = card.schedule_id.filter(|id| !id.is_empty())?;
            Some(ScheduleCandidate {
                job_id: job_id.to_string(),
                schedule_id,
                shift_tags: ShiftTags::parse(card.schedule_type.as_deref().unwrap_or("")),
                hours_per_week: card.hours_per_week.as_ref().and_then(hours_value),
            })
        })
        .collect()
}

/// The API sends hours either as a number or a numeric string
fn hours_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
