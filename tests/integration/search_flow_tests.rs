//! Integration tests for the search flow
//!
//! These tests run the coordinator and in-process tab agents against a
//! wiremock search API, end to end.

use chrono::Utc;
use shiftwatch::client::HttpJobSource;
use shiftwatch::config::{parse_config, Config};
use shiftwatch::coordinator::{landing_url, ChannelMessenger, Coordinator, CoordinatorHandle};
use shiftwatch::exhaustion::{ExhaustionKind, ExhaustionStore};
use shiftwatch::poller::PollSettings;
use shiftwatch::storage::{SqliteStorage, Storage};
use shiftwatch::tab::{TabAgent, TabOutcome};
use shiftwatch::{CoordinatorError, TabId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server_uri: &str, shifts: &str) -> Config {
    let toml = format!(
        r#"
[search]
shifts = [{shifts}]
shifts-prioritized = true

[client]
endpoint = "{server_uri}/graphql"
apply-url = "https://hiring.example.com/apply"
timeout-ms = 1000

[poll]
backoff-floor-ms = 10
backoff-cap-ms = 40
delay-base-ms = 10
delay-jitter-ms = 5

[tabs]
target-domain = "*.hiring.example.com"

[storage]
database-path = ":memory:"
"#
    );
    parse_config(&toml).expect("test config should be valid")
}

const JOBS_BODY: &str = r#"{"data":{"searchJobCardsByLocation":{"jobCards":[
    {"jobId":"JOB-A","jobType":"FULL_TIME","locationName":"Austin"},
    {"jobId":"JOB-B","jobType":"FLEX_TIME;PART_TIME","locationName":"Reno"},
    {"jobId":"JOB-C","jobType":"REDUCED_TIME","locationName":"Austin"}
]}}}"#;

const SCHEDULES_BODY: &str = r#"{"data":{"searchScheduleCards":{"scheduleCards":[
    {"scheduleId":"SCH-1","scheduleType":"PART_TIME","hoursPerWeek":20},
    {"scheduleId":"SCH-2","scheduleType":"FLEX_TIME","hoursPerWeek":"30"},
    {"scheduleId":"SCH-3","scheduleType":"FLEX_TIME","hoursPerWeek":36}
]}}}"#;

async fn mount_search_api(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("searchJobCardsByLocation"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JOBS_BODY))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("searchScheduleCards"))
        .and(body_string_contains("JOB-B"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SCHEDULES_BODY))
        .mount(server)
        .await;
}

/// A coordinator with its storage and messenger, ready to host tab agents
struct Harness {
    config: Config,
    storage: Arc<Mutex<SqliteStorage>>,
    messenger: ChannelMessenger,
    handle: CoordinatorHandle,
    source: Arc<HttpJobSource>,
}

impl Harness {
    async fn start(config: Config) -> Self {
        let storage = Arc::new(Mutex::new(
            SqliteStorage::open_in_memory().expect("in-memory database"),
        ));
        let messenger = ChannelMessenger::new();
        let (handle, _task) = Coordinator::restore(
            storage.clone(),
            messenger.clone(),
            &config.tabs,
            config.search.app_data(),
            Utc::now(),
        )
        .await
        .expect("coordinator should restore")
        .spawn();
        let source = Arc::new(
            HttpJobSource::new(&config.client, &config.search).expect("client should build"),
        );

        Self {
            config,
            storage,
            messenger,
            handle,
            source,
        }
    }

    fn exhaustion(&self) -> ExhaustionStore<SqliteStorage> {
        ExhaustionStore::new(self.storage.clone(), self.config.poll.exhaustion_ttl())
    }

    fn agent(&self, tab_id: TabId) -> TabAgent<HttpJobSource, SqliteStorage> {
        TabAgent::new(
            tab_id,
            landing_url(&self.config.tabs.target_domain),
            self.handle.clone(),
            self.messenger.connect(tab_id),
            self.source.clone(),
            self.exhaustion(),
            PollSettings::from_config(&self.config),
        )
    }
}

async fn run_to_outcome(agent: &mut TabAgent<HttpJobSource, SqliteStorage>) -> TabOutcome {
    tokio::time::timeout(Duration::from_secs(10), agent.run(CancellationToken::new()))
        .await
        .expect("agent should finish in time")
        .expect("agent should not fail")
}

#[tokio::test]
async fn test_search_acquires_preferred_schedule() {
    let server = MockServer::start().await;
    mount_search_api(&server).await;

    let config = create_test_config(&server.uri(), r#""FLEX_TIME", "FULL_TIME""#);
    let harness = Harness::start(config).await;

    let mut agent = harness.agent(1);
    assert!(!agent.register().await.unwrap());
    assert!(harness.handle.toggle_search(true).await.unwrap());

    let TabOutcome::Acquired(acquisition) = run_to_outcome(&mut agent).await else {
        panic!("expected an acquisition");
    };

    // FLEX_TIME ranks first, so JOB-B beats the earlier FULL_TIME job
    assert_eq!(acquisition.job_id, "JOB-B");
    assert_eq!(acquisition.schedule_id, "SCH-2");
    assert_eq!(
        acquisition.url.as_str(),
        "https://hiring.example.com/apply?jobId=JOB-B&scheduleId=SCH-2"
    );

    let exhaustion = harness.exhaustion();
    assert!(exhaustion
        .is_exhausted(ExhaustionKind::JobSchedulePair, "JOB-B-SCH-2", Utc::now())
        .unwrap());

    // The tab navigated away, so the search is over
    assert!(!harness.handle.search_status().await.unwrap());
    let session = harness.storage.lock().unwrap().load_session().unwrap().unwrap();
    assert!(!session.is_active());
    assert_eq!(session.active_tab_id(), None);
}

#[tokio::test]
async fn test_next_search_skips_exhausted_pair() {
    let server = MockServer::start().await;
    mount_search_api(&server).await;

    let config = create_test_config(&server.uri(), r#""FLEX_TIME""#);
    let harness = Harness::start(config).await;

    let mut first = harness.agent(1);
    first.register().await.unwrap();
    harness.handle.toggle_search(true).await.unwrap();
    let TabOutcome::Acquired(acquired) = run_to_outcome(&mut first).await else {
        panic!("expected an acquisition");
    };
    assert_eq!(acquired.schedule_id, "SCH-2");

    let mut second = harness.agent(2);
    second.register().await.unwrap();
    harness.handle.toggle_search(true).await.unwrap();
    let TabOutcome::Acquired(acquired) = run_to_outcome(&mut second).await else {
        panic!("expected an acquisition");
    };
    assert_eq!(acquired.job_id, "JOB-B");
    assert_eq!(acquired.schedule_id, "SCH-3");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("searchJobCardsByLocation"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_search_api(&server).await;

    let config = create_test_config(&server.uri(), r#""FLEX_TIME""#);
    let harness = Harness::start(config).await;

    let mut agent = harness.agent(1);
    agent.register().await.unwrap();
    harness.handle.toggle_search(true).await.unwrap();

    let outcome = run_to_outcome(&mut agent).await;
    assert!(matches!(outcome, TabOutcome::Acquired(ref a) if a.schedule_id == "SCH-2"));

    let job_searches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| String::from_utf8_lossy(&r.body).contains("searchJobCardsByLocation"))
        .count();
    assert_eq!(job_searches, 4);
}

#[tokio::test]
async fn test_job_without_matching_schedule_is_skipped() {
    let server = MockServer::start().await;
    mount_search_api(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("searchScheduleCards"))
        .and(body_string_contains("JOB-A"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data":{"searchScheduleCards":{"scheduleCards":[
                {"scheduleId":"SCH-9","scheduleType":"PART_TIME"},
                {"scheduleId":"SCH-8","scheduleType":"REDUCED_TIME"}
            ]}}}"#,
        ))
        .mount(&server)
        .await;

    // FULL_TIME picks JOB-A first; none of its schedules fit, so it is
    // excluded and the next poll falls through to JOB-B
    let config = create_test_config(&server.uri(), r#""FULL_TIME", "FLEX_TIME""#);
    let harness = Harness::start(config).await;

    let mut agent = harness.agent(1);
    agent.register().await.unwrap();
    harness.handle.toggle_search(true).await.unwrap();

    let TabOutcome::Acquired(acquisition) = run_to_outcome(&mut agent).await else {
        panic!("expected an acquisition");
    };
    assert_eq!(acquisition.job_id, "JOB-B");
    assert_eq!(acquisition.schedule_id, "SCH-2");

    assert!(harness
        .exhaustion()
        .is_exhausted(ExhaustionKind::Job, "JOB-A", Utc::now())
        .unwrap());
}

#[tokio::test]
async fn test_closing_active_tab_promotes_other() {
    let server = MockServer::start().await;
    mount_search_api(&server).await;

    let config = create_test_config(&server.uri(), r#""FLEX_TIME""#);
    let harness = Harness::start(config).await;

    let mut first = harness.agent(1);
    let mut second = harness.agent(2);
    first.register().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    second.register().await.unwrap();

    // The most recently registered tab wins
    harness.handle.toggle_search(true).await.unwrap();
    second.unregister().await.unwrap();
    assert!(harness.handle.search_status().await.unwrap());

    let outcome = run_to_outcome(&mut first).await;
    assert!(matches!(outcome, TabOutcome::Acquired(_)));
}

#[tokio::test]
async fn test_toggle_without_tabs_reports_no_eligible_tab() {
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), r#""FLEX_TIME""#);
    let harness = Harness::start(config).await;

    let result = harness.handle.toggle_search(true).await;
    assert!(matches!(result, Err(CoordinatorError::NoEligibleTab)));
    assert!(!harness.handle.search_status().await.unwrap());
}
