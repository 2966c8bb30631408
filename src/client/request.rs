//! Request payloads
//!
//! Both searches are GraphQL-style POST bodies sharing locale, country,
//! date and sort conventions.

use crate::model::Location;
use chrono::NaiveDate;
use serde::Serialize;

/// Jobs requested per search poll
pub const JOB_PAGE_SIZE: u32 = 100;

/// Schedules requested per job
pub const SCHEDULE_PAGE_SIZE: u32 = 1000;

const JOB_SEARCH_OPERATION: &str = "searchJobCardsByLocation";
const SCHEDULE_SEARCH_OPERATION: &str = "searchScheduleCards";

const JOB_SEARCH_QUERY: &str = "query searchJobCardsByLocation($searchJobRequest: SearchJobRequest!) {\n  searchJobCardsByLocation(searchJobRequest: $searchJobRequest) {\n    nextToken\n    jobCards {\n      jobId\n      jobTitle\n      jobType\n      locationName\n      city\n      state\n      totalPayRateMax\n      scheduleCount\n    }\n  }\n}\n";

const SCHEDULE_SEARCH_QUERY: &str = "query searchScheduleCards($searchScheduleRequest: SearchScheduleRequest!) {\n  searchScheduleCards(searchScheduleRequest: $searchScheduleRequest) {\n    nextToken\n    scheduleCards {\n      jobId\n      scheduleId\n      scheduleType\n      hoursPerWeek\n      firstDayOnSite\n      city\n    }\n  }\n}\n";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<V> {
    operation_name: &'static str,
    variables: V,
    query: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSearchVariables<'a> {
    search_job_request: SearchRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleSearchVariables<'a> {
    search_schedule_request: SearchRequest<'a>,
}

/// Fields shared by both searches
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    locale: &'a str,
    country: &'a str,
    key_words: &'static str,
    equal_filters: Vec<KeyValues>,
    contain_filters: Vec<KeyValues>,
    range_filters: Vec<KeyValues>,
    or_filters: Vec<KeyValues>,
    date_filters: Vec<DateFilter>,
    sorters: Vec<Sorter>,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    geo_query_clause: Option<GeoQueryClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consolidate_schedule: Option<bool>,
}

#[derive(Debug, Serialize)]
struct KeyValues {
    key: &'static str,
    val: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct DateFilter {
    key: &'static str,
    range: DateRange,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRange {
    start_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sorter {
    field_name: &'static str,
    ascending: &'static str,
}

/// Geographic restriction derived from the configured center and radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoQueryClause {
    pub lat: f64,
    pub lng: f64,
    pub unit: &'static str,
    pub distance: f64,
}

impl From<Location> for GeoQueryClause {
    fn from(location: Location) -> Self {
        Self {
            lat: location.lat,
            lng: location.lng,
            unit: "mi",
            distance: location.commute_radius,
        }
    }
}

impl<'a> SearchRequest<'a> {
    fn new(locale: &'a str, country: &'a str, today: NaiveDate, page_size: u32) -> Self {
        Self {
            locale,
            country,
            key_words: "",
            equal_filters: Vec::new(),
            contain_filters: Vec::new(),
            range_filters: Vec::new(),
            or_filters: Vec::new(),
            date_filters: vec![DateFilter {
                key: "firstDayOnSite",
                range: DateRange {
                    start_date: today.format("%Y-%m-%d").to_string(),
                },
            }],
            sorters: vec![Sorter {
                field_name: "totalPayRateMax",
                ascending: "false",
            }],
            page_size,
            geo_query_clause: None,
            job_id: None,
            consolidate_schedule: None,
        }
    }
}

/// Builds the job search body
pub fn job_search_body(
    locale: &str,
    country: &str,
    location: Option<Location>,
    today: NaiveDate,
) -> serde_json::Value {
    let mut request = SearchRequest::new(locale, country, today, JOB_PAGE_SIZE);
    request.contain_filters.push(KeyValues {
        key: "isPrivateSchedule",
        val: vec!["false"],
    });
    request.geo_query_clause = location.map(GeoQueryClause::from);

    to_value(GraphQlRequest {
        operation_name: JOB_SEARCH_OPERATION,
        variables: JobSearchVariables {
            search_job_request: request,
        },
        query: JOB_SEARCH_QUERY,
    })
}

/// Builds the schedule search body for one job
pub fn schedule_search_body(
    locale: &str,
    country: &str,
    job_id: &str,
    today: NaiveDate,
) -> serde_json::Value {
    let mut request = SearchRequest::new(locale, country, today, SCHEDULE_PAGE_SIZE);
    request.job_id = Some(job_id);
    request.consolidate_schedule = Some(true);

    to_value(GraphQlRequest {
        operation_name: SCHEDULE_SEARCH_OPERATION,
        variables: ScheduleSearchVariables {
            search_schedule_request: request,
        },
        query: SCHEDULE_SEARCH_QUERY,
    })
}

fn to_value<T: Serialize>(request: T) -> serde_json::Value {
    // Plain structs of strings, numbers and vectors always serialize
    serde_json::to_value(request).unwrap_or(serde_json::Value::Null)
}
