//! The per-tab poll state machine
//!
//! ```text
//! Idle -> Polling -> (Acquiring -> Stopped) | Waiting -> Polling
//!                 \-> Backoff -> Polling
//! ```
//!
//! Cancellation moves any state to `Stopped`. Nothing the remote API or the
//! store does ends the loop: failures are logged and retried after backoff.

use crate::client::{acquisition_url, JobSource};
use crate::config::Config;
use crate::exhaustion::{ExhaustionKind, ExhaustionStore};
use crate::model::{AppData, JobCandidate};
use crate::poller::backoff::{idle_delay, Backoff};
use crate::selection::{select_best_job, select_schedule};
use crate::storage::Storage;
use crate::ShiftError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Timing and target settings of a poll loop
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub backoff_floor: Duration,
    pub backoff_cap: Duration,
    pub delay_base: Duration,
    pub delay_jitter: Duration,
    pub apply_url: String,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backoff_floor: Duration::from_millis(config.poll.backoff_floor_ms),
            backoff_cap: Duration::from_millis(config.poll.backoff_cap_ms),
            delay_base: Duration::from_millis(config.poll.delay_base_ms),
            delay_jitter: Duration::from_millis(config.poll.delay_jitter_ms),
            apply_url: config.client.apply_url.clone(),
        }
    }
}

/// A chosen job and schedule, and where the tab should go next
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub job_id: String,
    pub schedule_id: String,
    pub url: Url,
}

/// Why a loop stopped
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Acquired(Acquisition),
    Cancelled,
}

/// Observable loop state
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling,
    Acquiring,
    /// Sleeping after a poll that found nothing
    Waiting(Duration),
    /// Sleeping after a failed poll
    Backoff(Duration),
    Stopped(StopReason),
}

/// Result of a single poll
#[derive(Debug)]
pub enum PollStep {
    Acquire(Acquisition),
    NoMatch,
    Failed(ShiftError),
    Cancelled,
}

/// Polls the search API until a schedule is acquired or the loop is cancelled
pub struct PollLoop<C, S> {
    source: Arc<C>,
    exhaustion: ExhaustionStore<S>,
    app_data: watch::Receiver<AppData>,
    settings: PollSettings,
    backoff: Backoff,
    state: watch::Sender<PollState>,
}

impl<C, S> PollLoop<C, S>
where
    C: JobSource,
    S: Storage + Send,
{
    pub fn new(
        source: Arc<C>,
        exhaustion: ExhaustionStore<S>,
        app_data: watch::Receiver<AppData>,
        settings: PollSettings,
    ) -> Self {
        let backoff = Backoff::new(settings.backoff_floor, settings.backoff_cap);
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            source,
            exhaustion,
            app_data,
            settings,
            backoff,
            state,
        }
    }

    /// Subscribes to state transitions
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    fn transition(&self, next: PollState) {
        tracing::trace!(state = ?next, "Poll loop transition");
        self.state.send_replace(next);
    }

    /// Runs polls back to back until acquisition or cancellation
    pub async fn run(&mut self, cancel: CancellationToken) -> StopReason {
        tracing::info!("Poll loop started");

        loop {
            if cancel.is_cancelled() {
                return self.stop(StopReason::Cancelled);
            }

            self.transition(PollState::Polling);
            let delay = match self.poll_once(&cancel).await {
                PollStep::Acquire(acquisition) => {
                    tracing::info!(
                        job_id = %acquisition.job_id,
                        schedule_id = %acquisition.schedule_id,
                        "Acquired schedule, navigating to {}",
                        acquisition.url
                    );
                    return self.stop(StopReason::Acquired(acquisition));
                }
                PollStep::Cancelled => return self.stop(StopReason::Cancelled),
                PollStep::NoMatch => {
                    self.backoff.reset();
                    let delay = idle_delay(
                        self.settings.delay_base,
                        self.settings.delay_jitter,
                        &mut rand::thread_rng(),
                    );
                    self.transition(PollState::Waiting(delay));
                    delay
                }
                PollStep::Failed(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        failures = self.backoff.failures(),
                        "Poll failed, retrying in {}ms: {}",
                        delay.as_millis(),
                        e
                    );
                    self.transition(PollState::Backoff(delay));
                    delay
                }
            };

            // No timer is armed once cancellation has been observed
            if cancel.is_cancelled() {
                return self.stop(StopReason::Cancelled);
            }

            tokio::select! {
                _ = cancel.cancelled() => return self.stop(StopReason::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn stop(&self, reason: StopReason) -> StopReason {
        if reason == StopReason::Cancelled {
            tracing::info!("Poll loop cancelled");
        }
        self.transition(PollState::Stopped(reason.clone()));
        reason
    }

    /// Runs one search, filter, score and schedule resolution cycle
    ///
    /// Results that arrive after `cancel` fires are discarded.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> PollStep {
        let app_data = self.app_data.borrow().clone();

        let jobs = match self.source.search_jobs(&app_data).await {
            Ok(jobs) => jobs,
            Err(e) => return PollStep::Failed(e.into()),
        };
        if cancel.is_cancelled() {
            return PollStep::Cancelled;
        }

        let now = Utc::now();
        let exhausted_jobs = match self.exhaustion.load(ExhaustionKind::Job, now) {
            Ok(set) => set,
            Err(e) => return PollStep::Failed(e.into()),
        };
        let candidates: Vec<JobCandidate> = jobs
            .into_iter()
            .filter(|job| !exhausted_jobs.contains(&job.id))
            .collect();

        let Some(job_id) = select_best_job(&candidates, &app_data.filter).map(str::to_string)
        else {
            tracing::debug!("No job matched among {} candidates", candidates.len());
            return PollStep::NoMatch;
        };
        tracing::debug!(%job_id, "Selected job");

        let schedules = match self.source.search_schedules(&job_id).await {
            Ok(schedules) => schedules,
            Err(e) => return PollStep::Failed(e.into()),
        };
        if cancel.is_cancelled() {
            return PollStep::Cancelled;
        }

        let now = Utc::now();
        let exhausted_pairs = match self.exhaustion.load(ExhaustionKind::JobSchedulePair, now) {
            Ok(set) => set,
            Err(e) => return PollStep::Failed(e.into()),
        };

        let chosen = select_schedule(&schedules, &app_data.filter.shifts, |key| {
            exhausted_pairs.contains(key)
        });

        let Some(schedule) = chosen else {
            tracing::debug!(%job_id, "No schedule matched, excluding job");
            if let Err(e) = self.exhaustion.mark_exhausted(ExhaustionKind::Job, &job_id, now) {
                return PollStep::Failed(e.into());
            }
            return PollStep::NoMatch;
        };

        self.transition(PollState::Acquiring);

        let url = match acquisition_url(&self.settings.apply_url, &job_id, &schedule.schedule_id)
        {
            Ok(url) => url,
            Err(e) => return PollStep::Failed(e.into()),
        };

        if let Err(e) = self.exhaustion.mark_exhausted(
            ExhaustionKind::JobSchedulePair,
            &schedule.pair_key(),
            now,
        ) {
            return PollStep::Failed(e.into());
        }

        PollStep::Acquire(Acquisition {
            job_id,
            schedule_id: schedule.schedule_id.clone(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Filter, ScheduleCandidate, ShiftTags};
    use crate::storage::SqliteStorage;
    use crate::{ClientError, ClientResult};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted job search results and records when each call happened
    #[derive(Default)]
    struct ScriptedSource {
        jobs: Mutex<VecDeque<ClientResult<Vec<JobCandidate>>>>,
        schedules: Mutex<HashMap<String, Vec<ScheduleCandidate>>>,
        job_calls: Mutex<Vec<Instant>>,
        schedule_calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn push_jobs(&self, result: ClientResult<Vec<JobCandidate>>) {
            self.jobs.lock().unwrap().push_back(result);
        }

        fn set_schedules(&self, job_id: &str, schedules: Vec<ScheduleCandidate>) {
            self.schedules
                .lock()
                .unwrap()
                .insert(job_id.to_string(), schedules);
        }

        fn job_call_times(&self) -> Vec<Instant> {
            self.job_calls.lock().unwrap().clone()
        }
    }

    impl JobSource for ScriptedSource {
        async fn search_jobs(&self, _app_data: &AppData) -> ClientResult<Vec<JobCandidate>> {
            self.job_calls.lock().unwrap().push(Instant::now());
            self.jobs.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn search_schedules(&self, job_id: &str) -> ClientResult<Vec<ScheduleCandidate>> {
            self.schedule_calls.lock().unwrap().push(job_id.to_string());
            Ok(self
                .schedules
                .lock()
                .unwrap()
                .get(job_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn timeout_error() -> ClientError {
        ClientError::NetworkTimeout {
            operation: "job search".to_string(),
            timeout_ms: 2000,
        }
    }

    fn job(id: &str, tags: &str, index: usize) -> JobCandidate {
        JobCandidate::new(id, ShiftTags::parse(tags), "Austin", index)
    }

    fn schedule(job_id: &str, schedule_id: &str, tags: &str) -> ScheduleCandidate {
        ScheduleCandidate {
            job_id: job_id.to_string(),
            schedule_id: schedule_id.to_string(),
            shift_tags: ShiftTags::parse(tags),
            hours_per_week: Some(40.0),
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            backoff_floor: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(30_000),
            delay_base: Duration::from_millis(1000),
            delay_jitter: Duration::from_millis(500),
            apply_url: "https://hiring.example.com/apply".to_string(),
        }
    }

    fn exhaustion_store() -> ExhaustionStore<SqliteStorage> {
        let storage = SqliteStorage::open_in_memory().unwrap();
        ExhaustionStore::new(Arc::new(Mutex::new(storage)), Duration::from_secs(120))
    }

    fn poll_loop(
        source: Arc<ScriptedSource>,
        exhaustion: ExhaustionStore<SqliteStorage>,
        filter: Filter,
    ) -> (PollLoop<ScriptedSource, SqliteStorage>, watch::Sender<AppData>) {
        let app_data = AppData {
            filter,
            location: None,
        };
        let (tx, rx) = watch::channel(app_data);
        (PollLoop::new(source, exhaustion, rx, settings()), tx)
    }

    fn shift_filter(shifts: &[&str]) -> Filter {
        Filter {
            shifts: shifts.iter().map(|s| s.to_string()).collect(),
            ..Filter::default()
        }
    }

    #[tokio::test]
    async fn test_poll_once_acquires_matching_schedule() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(vec![job("A", "FULL_TIME", 0), job("B", "FLEX_TIME", 1)]));
        source.set_schedules(
            "B",
            vec![
                schedule("B", "S1", "FULL_TIME"),
                schedule("B", "S2", "FLEX_TIME"),
            ],
        );

        let exhaustion = exhaustion_store();
        let (mut poller, _tx) =
            poll_loop(source.clone(), exhaustion.clone(), shift_filter(&["FLEX_TIME"]));

        let step = poller.poll_once(&CancellationToken::new()).await;
        let PollStep::Acquire(acquisition) = step else {
            panic!("expected acquisition, got {:?}", step);
        };

        assert_eq!(acquisition.job_id, "B");
        assert_eq!(acquisition.schedule_id, "S2");
        assert_eq!(
            acquisition.url.as_str(),
            "https://hiring.example.com/apply?jobId=B&scheduleId=S2"
        );
        assert!(exhaustion
            .is_exhausted(ExhaustionKind::JobSchedulePair, "B-S2", Utc::now())
            .unwrap());
        assert_eq!(poller.state(), PollState::Acquiring);
    }

    #[tokio::test]
    async fn test_exhausted_jobs_are_filtered_before_scoring() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0), job("B", "FLEX_TIME", 1)]));
        source.set_schedules("B", vec![schedule("B", "S1", "FLEX_TIME")]);

        let exhaustion = exhaustion_store();
        exhaustion
            .mark_exhausted(ExhaustionKind::Job, "A", Utc::now())
            .unwrap();
        let (mut poller, _tx) =
            poll_loop(source.clone(), exhaustion, shift_filter(&["FLEX_TIME"]));

        let step = poller.poll_once(&CancellationToken::new()).await;
        assert!(matches!(step, PollStep::Acquire(ref a) if a.job_id == "B"));
        assert_eq!(*source.schedule_calls.lock().unwrap(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_job_without_matching_schedule_is_exhausted() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0)]));
        source.set_schedules(
            "A",
            vec![
                schedule("A", "S1", "FULL_TIME"),
                schedule("A", "S2", "PART_TIME"),
            ],
        );

        let exhaustion = exhaustion_store();
        let (mut poller, _tx) =
            poll_loop(source.clone(), exhaustion.clone(), shift_filter(&["FLEX_TIME"]));

        let step = poller.poll_once(&CancellationToken::new()).await;
        assert!(matches!(step, PollStep::NoMatch));
        assert!(exhaustion
            .is_exhausted(ExhaustionKind::Job, "A", Utc::now())
            .unwrap());
    }

    #[tokio::test]
    async fn test_no_candidates_is_no_match() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(Vec::new()));
        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());

        let step = poller.poll_once(&CancellationToken::new()).await;
        assert!(matches!(step, PollStep::NoMatch));
        assert!(source.schedule_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_error_is_failed_step() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Err(timeout_error()));
        let (mut poller, _tx) = poll_loop(source, exhaustion_store(), Filter::default());

        let step = poller.poll_once(&CancellationToken::new()).await;
        assert!(matches!(
            step,
            PollStep::Failed(ShiftError::Client(ClientError::NetworkTimeout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_results_after_cancellation_are_discarded() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0)]));
        source.set_schedules("A", vec![schedule("A", "S1", "FLEX_TIME")]);
        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let step = poller.poll_once(&cancel).await;
        assert!(matches!(step, PollStep::Cancelled));
        assert!(source.schedule_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_app_data_is_used() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(vec![job("A", "FULL_TIME", 0), job("B", "FLEX_TIME", 1)]));
        source.set_schedules("B", vec![schedule("B", "S1", "FLEX_TIME")]);
        let (mut poller, tx) = poll_loop(source, exhaustion_store(), shift_filter(&["PART_TIME"]));

        tx.send_replace(AppData {
            filter: shift_filter(&["FLEX_TIME"]),
            location: None,
        });

        let step = poller.poll_once(&CancellationToken::new()).await;
        assert!(matches!(step, PollStep::Acquire(ref a) if a.job_id == "B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_exponentially() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0)]));
        source.set_schedules("A", vec![schedule("A", "S1", "FLEX_TIME")]);

        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());
        let reason = poller.run(CancellationToken::new()).await;

        assert!(matches!(reason, StopReason::Acquired(ref a) if a.schedule_id == "S1"));

        let calls = source.job_call_times();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<u128> = calls.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps, vec![1000, 2000, 4000]);
        assert!(matches!(poller.state(), PollState::Stopped(StopReason::Acquired(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_polls_wait_with_jitter() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Ok(Vec::new()));
        source.push_jobs(Ok(Vec::new()));
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0)]));
        source.set_schedules("A", vec![schedule("A", "S1", "FLEX_TIME")]);

        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());
        poller.run(CancellationToken::new()).await;

        let calls = source.job_call_times();
        assert_eq!(calls.len(), 3);
        for gap in calls.windows(2).map(|w| (w[1] - w[0]).as_millis()) {
            assert!((1000..=1500).contains(&gap), "gap {} out of range", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_backoff() {
        let source = Arc::new(ScriptedSource::default());
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Ok(Vec::new()));
        source.push_jobs(Err(timeout_error()));
        source.push_jobs(Ok(vec![job("A", "FLEX_TIME", 0)]));
        source.set_schedules("A", vec![schedule("A", "S1", "FLEX_TIME")]);

        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());
        poller.run(CancellationToken::new()).await;

        let calls = source.job_call_times();
        let gaps: Vec<u128> = calls.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
        assert_eq!(gaps[0], 1000);
        assert_eq!(gaps[1], 2000);
        assert!((1000..=1500).contains(&gaps[2]));
        assert_eq!(gaps[3], 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_loop() {
        let source = Arc::new(ScriptedSource::default());
        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());
        let mut states = poller.subscribe();

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { poller.run(cancel).await })
        };

        states
            .wait_for(|state| matches!(state, PollState::Waiting(_)))
            .await
            .unwrap();
        cancel.cancel();

        let reason = handle.await.unwrap();
        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(source.job_call_times().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_polls() {
        let source = Arc::new(ScriptedSource::default());
        let (mut poller, _tx) = poll_loop(source.clone(), exhaustion_store(), Filter::default());

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(poller.run(cancel).await, StopReason::Cancelled);
        assert!(source.job_call_times().is_empty());
        assert_eq!(poller.state(), PollState::Stopped(StopReason::Cancelled));
    }
}
