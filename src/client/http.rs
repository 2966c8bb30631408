//! HTTP transport for job and schedule searches
//!
//! Every call is raced against a hard timeout. Errors are classified into
//! `ClientError` variants; undecodable bodies become empty results.

use crate::client::request::{job_search_body, schedule_search_body};
use crate::client::response::{parse_job_cards, parse_schedule_cards};
use crate::config::{ClientConfig, SearchConfig};
use crate::model::{AppData, JobCandidate, ScheduleCandidate};
use crate::{ClientError, ClientResult};
use chrono::{Local, NaiveDate};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Source of job and schedule candidates
///
/// The poll loop depends on this trait rather than on HTTP so it can be
/// driven by scripted sources in tests.
pub trait JobSource: Send + Sync {
    /// Searches open jobs for the given preferences
    fn search_jobs(
        &self,
        app_data: &AppData,
    ) -> impl Future<Output = ClientResult<Vec<JobCandidate>>> + Send;

    /// Lists schedules of one job
    fn search_schedules(
        &self,
        job_id: &str,
    ) -> impl Future<Output = ClientResult<Vec<ScheduleCandidate>>> + Send;
}

/// Builds an HTTP client for the search API
///
/// # Example
///
/// ```no_run
/// use shiftwatch::config::ClientConfig;
/// use shiftwatch::client::build_http_client;
///
/// let config = ClientConfig {
///     endpoint: "https://api.hiring.example.com/graphql".to_string(),
///     schedule_endpoint: None,
///     apply_url: "https://hiring.example.com/apply".to_string(),
///     bearer_token: None,
///     timeout_ms: 2000,
///     user_agent: None,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("shiftwatch/{}", env!("CARGO_PKG_VERSION")));

    Client::builder()
        .user_agent(user_agent)
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the page a tab navigates to once a schedule is chosen
pub fn acquisition_url(
    apply_url: &str,
    job_id: &str,
    schedule_id: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(apply_url)?;
    url.query_pairs_mut()
        .append_pair("jobId", job_id)
        .append_pair("scheduleId", schedule_id);
    Ok(url)
}

/// `JobSource` backed by the remote search API
#[derive(Debug, Clone)]
pub struct HttpJobSource {
    client: Client,
    endpoint: String,
    schedule_endpoint: String,
    bearer_token: Option<String>,
    timeout: Duration,
    locale: String,
    country: String,
}

impl HttpJobSource {
    /// Creates a source from client and search configuration
    pub fn new(client: &ClientConfig, search: &SearchConfig) -> ClientResult<Self> {
        let http = build_http_client(client).map_err(ClientError::Build)?;
        Ok(Self {
            client: http,
            endpoint: client.endpoint.clone(),
            schedule_endpoint: client.schedule_endpoint().to_string(),
            bearer_token: client.bearer_token.clone(),
            timeout: client.timeout(),
            locale: search.locale.clone(),
            country: search.country.clone(),
        })
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// POSTs a body and returns the response text, bounded by the hard timeout
    async fn post(
        &self,
        operation: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> ClientResult<String> {
        let mut request = self.client.post(endpoint).json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                return Err(ClientError::NetworkTimeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(ClientError::NetworkTimeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(ClientError::NetworkFailure {
                    operation: operation.to_string(),
                    source: e,
                })
            }
            Ok(Ok(result)) => result,
        };

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

impl JobSource for HttpJobSource {
    async fn search_jobs(&self, app_data: &AppData) -> ClientResult<Vec<JobCandidate>> {
        let body = job_search_body(&self.locale, &self.country, app_data.location, Self::today());
        let text = self.post("job search", &self.endpoint, &body).await?;
        let jobs = parse_job_cards(&text);
        tracing::debug!("Job search returned {} candidates", jobs.len());
        Ok(jobs)
    }

    async fn search_schedules(&self, job_id: &str) -> ClientResult<Vec<ScheduleCandidate>> {
        let body = schedule_search_body(&self.locale, &self.country, job_id, Self::today());
        let text = self
            .post("schedule search", &self.schedule_endpoint, &body)
            .await?;
        let schedules = parse_schedule_cards(job_id, &text);
        tracing::debug!(%job_id, "Schedule search returned {} schedules", schedules.len());
        Ok(schedules)
    }
}
