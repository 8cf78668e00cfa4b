//! Status polling for submitted jobs.
//!
//! [`JobPoller::track`] spawns one task per job. The task checks the remote
//! status immediately and then on a fixed interval, writes every observed
//! status into the [`JobDatabase`], and stops at the first terminal state,
//! at the poll cap, or when the returned [`TrackingHandle`] is cancelled.
//!
//! Each status request runs in its own task. When a tick fires while the
//! previous request is still outstanding, that request is aborted and any
//! answer it might still deliver is dropped by sequence number, so a slow
//! stale response can never overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vg_core::error::{Error, Result};
use vg_core::progress;
use vg_core::{Credential, JobStatus};

use crate::events::{JobOutcome, TrackEvent};
use crate::generator::backend::JobBackend;
use crate::generator::backend::schemas::JobStatusReport;
use crate::generator::db::JobDatabase;
use crate::generator::db::job::JobPatch;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// 120 polls at 5s is ten minutes.
pub const DEFAULT_MAX_POLLS: u32 = 120;
pub const ELAPSED_TICK: Duration = Duration::from_secs(1);
pub const FAILED_FALLBACK_MESSAGE: &str = "Video generation failed";

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Non-terminal answers tolerated before the job is failed as timed out.
    pub max_polls: u32,
    /// Consecutive status-call errors tolerated before failing the job.
    /// Zero fails on the first error.
    pub max_transient_retries: u32,
    pub elapsed_tick: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            max_transient_retries: 0,
            elapsed_tick: ELAPSED_TICK,
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    db: JobDatabase,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, db: JobDatabase, config: PollerConfig) -> Self {
        Self { backend, db, config }
    }

    /// Start tracking `job_id`. Must be called from within a tokio runtime.
    pub fn track(&self, job_id: impl Into<String>, credential: Credential) -> TrackingHandle {
        let job_id = job_id.into();
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let tracker = Tracker {
            job_id: job_id.clone(),
            credential,
            backend: self.backend.clone(),
            db: self.db.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            events: events_tx,
            status: JobStatus::Processing,
        };
        let task = tokio::spawn(tracker.run());

        TrackingHandle {
            job_id,
            cancel,
            events: events_rx,
            task: Some(task),
        }
    }
}

/// Caller side of a tracked job. Dropping it cancels tracking.
pub struct TrackingHandle {
    job_id: String,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<TrackEvent>,
    task: Option<JoinHandle<()>>,
}

impl TrackingHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop both timers, abort the outstanding request and suppress every
    /// later store write and event.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!(job_id = %self.job_id, "Cancelling job tracking");
        }
        self.cancel.cancel();
    }

    /// Next event, or `None` once tracking has ended or been cancelled.
    pub async fn next_event(&mut self) -> Option<TrackEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Wait for the terminal outcome. `None` if tracking was cancelled.
    pub async fn outcome(mut self) -> Option<JobOutcome> {
        while let Some(event) = self.next_event().await {
            if event.is_terminal() {
                return JobOutcome::from_event(event);
            }
        }
        None
    }

    /// Cancel and wait for the tracking task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Step {
    Continue,
    Done(JobOutcome),
}

struct Tracker {
    job_id: String,
    credential: Credential,
    backend: Arc<dyn JobBackend>,
    db: JobDatabase,
    config: PollerConfig,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TrackEvent>,
    status: JobStatus,
}

/// Per-job counters, reset only by a new tracking task.
#[derive(Default)]
struct PollState {
    /// Sequence number of the newest request issued.
    seq: u64,
    /// Non-terminal answers received.
    answered: u32,
    consecutive_errors: u32,
}

impl Tracker {
    async fn run(mut self) {
        if let Some(record) = self.db.get_job(&self.job_id).await {
            if record.status.is_active() {
                self.status = record.status;
            }
        }
        info!(job_id = %self.job_id, status = %self.status, "Tracking job");

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<(u64, Result<JobStatusReport>)>();

        let mut poll_timer = time::interval(self.config.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let tick = self.config.elapsed_tick;
        let mut elapsed_timer = time::interval_at(Instant::now() + tick, tick);
        elapsed_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();

        let mut state = PollState::default();
        let mut in_flight: Option<JoinHandle<()>> = None;

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break None,

                Some((seq, result)) = results_rx.recv() => {
                    if seq != state.seq {
                        debug!(job_id = %self.job_id, seq, "Discarding superseded status response");
                        continue;
                    }
                    in_flight = None;

                    if let Step::Done(outcome) = self.handle_result(result, &mut state).await {
                        break Some(outcome);
                    }
                }

                _ = poll_timer.tick() => {
                    if let Some(previous) = in_flight.take() {
                        debug!(job_id = %self.job_id, seq = state.seq, "Superseding in-flight status request");
                        previous.abort();
                    }

                    // A remote that never answers still has to time out.
                    if state.seq > u64::from(self.config.max_polls) {
                        let polls = self.config.max_polls;
                        break Some(self.fail(Error::Timeout { polls }).await);
                    }

                    state.seq += 1;
                    in_flight = Some(self.spawn_status_request(state.seq, results_tx.clone()));
                }

                _ = elapsed_timer.tick() => {
                    let elapsed = started.elapsed().as_secs();
                    self.emit(TrackEvent::Progress {
                        job_id: self.job_id.clone(),
                        view: progress::estimate(self.status, elapsed),
                    });
                }
            }
        };

        if let Some(request) = in_flight {
            request.abort();
        }

        match outcome {
            Some(JobOutcome::Completed { .. }) => {
                info!(job_id = %self.job_id, "Stopped tracking completed job")
            }
            Some(JobOutcome::Failed(_)) => {
                info!(job_id = %self.job_id, "Stopped tracking failed job")
            }
            None => info!(job_id = %self.job_id, "Tracking cancelled"),
        }
    }

    fn spawn_status_request(
        &self,
        seq: u64,
        results: mpsc::UnboundedSender<(u64, Result<JobStatusReport>)>,
    ) -> JoinHandle<()> {
        debug!(job_id = %self.job_id, seq, "Polling job status");

        let backend = self.backend.clone();
        let job_id = self.job_id.clone();
        let credential = self.credential.clone();
        tokio::spawn(async move {
            let result = backend.get_job_status(&job_id, &credential).await;
            let _ = results.send((seq, result));
        })
    }

    async fn handle_result(&mut self, result: Result<JobStatusReport>, state: &mut PollState) -> Step {
        let report = match result {
            Ok(report) => {
                state.consecutive_errors = 0;
                report
            }
            Err(e) => {
                state.consecutive_errors += 1;
                if state.consecutive_errors > self.config.max_transient_retries {
                    return Step::Done(self.fail(e).await);
                }
                warn!(
                    job_id = %self.job_id,
                    error = %e,
                    attempt = state.consecutive_errors,
                    "Status check failed, retrying on next tick"
                );
                return Step::Continue;
            }
        };

        match report.status {
            JobStatus::Completed => match report.result_url {
                Some(url) => return Step::Done(self.complete(url).await),
                None => {
                    warn!(job_id = %self.job_id, "Service reported completion without a video URL");
                    self.observe(JobStatus::Processing).await;
                }
            },
            JobStatus::Failed => {
                let message = report
                    .error_message()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(FAILED_FALLBACK_MESSAGE)
                    .to_string();
                return Step::Done(self.fail(Error::remote(message)).await);
            }
            status => self.observe(status).await,
        }

        state.answered += 1;
        if state.answered > self.config.max_polls {
            let polls = state.answered;
            return Step::Done(self.fail(Error::Timeout { polls }).await);
        }
        Step::Continue
    }

    async fn observe(&mut self, status: JobStatus) {
        self.status = status;
        self.persist(&JobPatch::status(status)).await;
        self.emit(TrackEvent::Status {
            job_id: self.job_id.clone(),
            status,
        });
    }

    async fn complete(&mut self, result_url: String) -> JobOutcome {
        self.status = JobStatus::Completed;
        info!(job_id = %self.job_id, url = %result_url, "Video generation completed");

        self.persist(&JobPatch::completed(result_url.clone(), Utc::now())).await;
        self.emit(TrackEvent::Completed {
            job_id: self.job_id.clone(),
            result_url: result_url.clone(),
        });
        JobOutcome::Completed { result_url }
    }

    async fn fail(&mut self, error: Error) -> JobOutcome {
        self.status = JobStatus::Failed;
        warn!(job_id = %self.job_id, error = %error, "Video generation failed");

        self.persist(&JobPatch::failed(error.to_string())).await;
        self.emit(TrackEvent::Failed {
            job_id: self.job_id.clone(),
            error: error.clone(),
        });
        JobOutcome::Failed(error)
    }

    /// Store write. Liveness is re-checked inside the store right up to the
    /// write itself, so a cancel that lands while the slot is locked or
    /// being read still suppresses it.
    async fn persist(&self, patch: &JobPatch) {
        let cancel = &self.cancel;
        self.db
            .update_job(&self.job_id, patch, &|| !cancel.is_cancelled())
            .await;
    }

    fn emit(&self, event: TrackEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::SubsecRound;
    use vg_core::GenerationSettings;

    use super::*;
    use crate::generator::db::backend::CountingBackend;
    use crate::generator::db::job::JobRecord;
    use crate::test_support::{Scripted, ScriptedBackend, completed, failed, processing};

    struct Fixture {
        store: Arc<CountingBackend>,
        db: JobDatabase,
        backend: Arc<ScriptedBackend>,
        poller: JobPoller,
    }

    async fn fixture(backend: ScriptedBackend, config: PollerConfig) -> Fixture {
        fixture_with_store(CountingBackend::default(), backend, config).await
    }

    async fn fixture_with_store(
        store: CountingBackend,
        backend: ScriptedBackend,
        config: PollerConfig,
    ) -> Fixture {
        let store = Arc::new(store);
        let db = JobDatabase::new(store.clone());
        db.insert_job(JobRecord::new(
            "vid_1",
            "a red ball bouncing",
            GenerationSettings::default(),
            JobStatus::Pending,
        ))
        .await;

        let backend = Arc::new(backend);
        let poller = JobPoller::new(backend.clone(), db.clone(), config);
        Fixture { store, db, backend, poller }
    }

    fn credential() -> Credential {
        Credential::new("sk-test").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn completes_on_third_poll_and_stops_writing() {
        let f = fixture(
            ScriptedBackend::new(vec![processing(), processing(), completed("https://x/y.mp4")]),
            PollerConfig::default(),
        )
        .await;

        let before = Utc::now().trunc_subsecs(3);
        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        let after = Utc::now();
        assert_eq!(
            outcome,
            Some(JobOutcome::Completed { result_url: "https://x/y.mp4".into() })
        );

        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result_url.as_deref(), Some("https://x/y.mp4"));
        let completed_at = record.completed_at.unwrap();
        assert!(before <= completed_at && completed_at <= after);
        assert!(record.error_message.is_none());

        let writes = f.store.writes();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.store.writes(), writes);
        assert_eq!(f.backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_is_persisted() {
        let f = fixture(
            ScriptedBackend::new(vec![processing(), failed(Some("content policy violation"))]),
            PollerConfig::default(),
        )
        .await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert_eq!(
            outcome,
            Some(JobOutcome::Failed(Error::remote("content policy violation")))
        );

        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("content policy violation"));
        assert!(record.completed_at.is_none());
        assert_eq!(f.backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_without_details_uses_fallback() {
        let f = fixture(ScriptedBackend::new(vec![failed(None)]), PollerConfig::default()).await;

        f.poller.track("vid_1", credential()).outcome().await;
        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.error_message.as_deref(), Some(FAILED_FALLBACK_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_cap() {
        let f = fixture(ScriptedBackend::repeating(processing()), PollerConfig::default()).await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        let Some(JobOutcome::Failed(err)) = outcome else {
            panic!("expected a failed outcome, got {outcome:?}");
        };
        assert!(err.is_timeout());
        assert_eq!(f.backend.calls(), 121);

        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_remote_still_times_out() {
        let f = fixture(ScriptedBackend::repeating(Scripted::Hang), PollerConfig::default()).await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert!(matches!(outcome, Some(JobOutcome::Failed(Error::Timeout { .. }))));
        assert_eq!(f.backend.calls(), 121);
        assert_eq!(f.db.get_job("vid_1").await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_is_superseded() {
        let f = fixture(
            ScriptedBackend::new(vec![
                Scripted::delayed(Duration::from_secs(8), completed("https://x/stale.mp4")),
                processing(),
                completed("https://x/fresh.mp4"),
            ]),
            PollerConfig::default(),
        )
        .await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert_eq!(
            outcome,
            Some(JobOutcome::Completed { result_url: "https://x/fresh.mp4".into() })
        );
        assert_eq!(
            f.db.get_job("vid_1").await.unwrap().result_url.as_deref(),
            Some("https://x/fresh.mp4")
        );

        // the aborted first request must not land late
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            f.db.get_job("vid_1").await.unwrap().result_url.as_deref(),
            Some("https://x/fresh.mp4")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_all_side_effects() {
        let f = fixture(
            ScriptedBackend::new(vec![Scripted::delayed(
                Duration::from_secs(3),
                completed("https://x/y.mp4"),
            )]),
            PollerConfig::default(),
        )
        .await;

        let handle = f.poller.track("vid_1", credential());
        time::sleep(Duration::from_secs(1)).await;
        let writes = f.store.writes();

        handle.cancel();
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(f.store.writes(), writes);
        assert_eq!(handle.outcome().await, None);
        assert_eq!(f.backend.calls(), 1);
        assert_eq!(f.db.get_job("vid_1").await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_store_write_leaves_record_untouched() {
        // every store read takes 2s, so the completion write is still
        // reading the slot at t=3s
        let f = fixture_with_store(
            CountingBackend::with_read_delay(Duration::from_secs(2)),
            ScriptedBackend::new(vec![completed("https://x/y.mp4")]),
            PollerConfig::default(),
        )
        .await;

        let handle = f.poller.track("vid_1", credential());
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.backend.calls(), 1);
        let writes = f.store.writes();

        handle.cancel();
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(f.store.writes(), writes);
        assert_eq!(handle.outcome().await, None);
        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.result_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_supersession_ignores_both_requests() {
        let f = fixture(
            ScriptedBackend::new(vec![
                Scripted::delayed(Duration::from_secs(8), completed("https://x/stale.mp4")),
                Scripted::delayed(Duration::from_secs(8), completed("https://x/fresh.mp4")),
            ]),
            PollerConfig::default(),
        )
        .await;

        // first request aborted at t=5s, second outstanding until t=13s
        let handle = f.poller.track("vid_1", credential());
        time::sleep(Duration::from_secs(7)).await;
        assert_eq!(f.backend.calls(), 2);
        let writes = f.store.writes();

        handle.cancel();
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(f.store.writes(), writes);
        assert_eq!(f.backend.calls(), 2);
        assert_eq!(handle.outcome().await, None);
        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.result_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let f = fixture(ScriptedBackend::repeating(processing()), PollerConfig::default()).await;

        drop(f.poller.track("vid_1", credential()));
        time::sleep(Duration::from_secs(30)).await;
        assert!(f.backend.calls() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_task() {
        let f = fixture(ScriptedBackend::repeating(processing()), PollerConfig::default()).await;

        let handle = f.poller.track("vid_1", credential());
        time::sleep(Duration::from_secs(11)).await;
        handle.shutdown().await;

        let calls = f.backend.calls();
        let writes = f.store.writes();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.backend.calls(), calls);
        assert_eq!(f.store.writes(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_fails_fast_by_default() {
        let f = fixture(
            ScriptedBackend::new(vec![Scripted::error("connection reset"), completed("https://x/y.mp4")]),
            PollerConfig::default(),
        )
        .await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert_eq!(outcome, Some(JobOutcome::Failed(Error::remote("connection reset"))));
        let record = f.db.get_job("vid_1").await.unwrap();
        assert_eq!(record.error_message.as_deref(), Some("connection reset"));
        assert_eq!(f.backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_retries_are_tunable() {
        let f = fixture(
            ScriptedBackend::new(vec![Scripted::error("connection reset"), completed("https://x/y.mp4")]),
            PollerConfig {
                max_transient_retries: 1,
                ..Default::default()
            },
        )
        .await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert_eq!(
            outcome,
            Some(JobOutcome::Completed { result_url: "https://x/y.mp4".into() })
        );
        assert_eq!(f.backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_without_url_keeps_polling() {
        let f = fixture(
            ScriptedBackend::new(vec![
                Scripted::reply(JobStatus::Completed, None, None),
                completed("https://x/y.mp4"),
            ]),
            PollerConfig::default(),
        )
        .await;

        let mut handle = f.poller.track("vid_1", credential());
        let mut statuses = Vec::new();
        let mut terminal = 0;
        while let Some(event) = handle.next_event().await {
            match event {
                TrackEvent::Status { status, .. } => statuses.push(status),
                TrackEvent::Completed { .. } => terminal += 1,
                _ => {}
            }
        }

        assert_eq!(statuses, vec![JobStatus::Processing]);
        assert_eq!(terminal, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_record_is_not_an_error() {
        let f = fixture(
            ScriptedBackend::new(vec![completed("https://x/y.mp4")]),
            PollerConfig::default(),
        )
        .await;
        f.db.delete_job("vid_1").await;

        let outcome = f.poller.track("vid_1", credential()).outcome().await;
        assert!(matches!(outcome, Some(JobOutcome::Completed { .. })));
        assert!(f.db.get_job("vid_1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticks_every_second() {
        let f = fixture(
            ScriptedBackend::new(vec![
                processing(),
                processing(),
                completed("https://x/y.mp4"),
            ]),
            PollerConfig::default(),
        )
        .await;

        let mut handle = f.poller.track("vid_1", credential());
        let mut views = Vec::new();
        while let Some(event) = handle.next_event().await {
            if let TrackEvent::Progress { view, .. } = event {
                views.push(view);
            }
        }

        assert!(!views.is_empty());
        assert_eq!(views[0].elapsed_secs, 1);
        assert!(views.iter().all(|v| v.percent <= progress::IN_FLIGHT_CAP_PERCENT));
        assert!(views.windows(2).all(|w| w[0].elapsed_secs < w[1].elapsed_secs));
    }
}
