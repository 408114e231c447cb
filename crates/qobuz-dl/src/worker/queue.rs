use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::broadcast::job_progress::{JobProgressBroadcaster, JobProgressTracker, JobStatus};
use crate::broadcast::status::{BacklogEntry, StatusPublisher};
use crate::error::QueueError;
use crate::pipeline::{BroadcastProgress, Pipeline, PipelineContext};
use crate::worker::job::{Job, JobInfo, JobOutcome, JobTarget};

struct ActiveJob {
    job: Job,
    cancel: CancellationToken,
}

struct QueuedJob {
    job: Job,
    tracker: JobProgressTracker,
}

#[derive(Default)]
struct QueueState {
    active: Option<ActiveJob>,
    backlog: VecDeque<QueuedJob>,
    /// Pipeline tasks that have not returned yet, including cancelled ones
    /// still unwinding after the queue moved on.
    tasks_in_flight: usize,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.active.is_none() && self.backlog.is_empty() && self.tasks_in_flight == 0
    }
}

struct QueueInner {
    pipeline: Arc<Pipeline>,
    status: StatusPublisher,
    events: JobProgressBroadcaster,
    state: Mutex<QueueState>,
    idle: watch::Sender<bool>,
}

/// Admits jobs and runs them one at a time in submission order.
///
/// Must be used from within a Tokio runtime; each promoted job runs its
/// pipeline on a spawned task.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(
        pipeline: Arc<Pipeline>,
        status: StatusPublisher,
        events: JobProgressBroadcaster,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(QueueInner {
                pipeline,
                status,
                events,
                state: Mutex::new(QueueState::default()),
                idle,
            }),
        }
    }

    pub fn status(&self) -> &StatusPublisher {
        &self.inner.status
    }

    pub fn events(&self) -> &JobProgressBroadcaster {
        &self.inner.events
    }

    /// Appends a job to the backlog, starting it right away when nothing is
    /// running. Returns the new job's id.
    pub fn submit(&self, target: JobTarget) -> String {
        let job = Job::new(target);
        let job_id = job.id.clone();
        let tracker = self.inner.events.start_job(&job.id, &job.label);
        let queued = QueuedJob { job, tracker };

        let mut state = self.inner.lock();
        if state.active.is_none() {
            self.inner.start(&mut state, queued);
        } else {
            info!("Queued job {} ({})", job_id, queued.job.label);
            state.backlog.push_back(queued);
            self.inner.publish_backlog(&state);
        }
        self.inner.refresh_idle(&state);

        job_id
    }

    /// Cancels a running job (its pipeline unwinds and the next job is
    /// promoted immediately) or drops a queued one without it ever starting.
    pub fn cancel(&self, job_id: &str) -> Result<(), QueueError> {
        let mut state = self.inner.lock();

        let is_active = state
            .active
            .as_ref()
            .is_some_and(|active| active.job.id == job_id);
        if is_active {
            if let Some(active) = state.active.take() {
                info!("Cancelling running job {} ({})", job_id, active.job.label);
                active.cancel.cancel();
            }
            self.inner.promote_next(&mut state);
            self.inner.refresh_idle(&state);
            return Ok(());
        }

        let position = state.backlog.iter().position(|q| q.job.id == job_id);
        if let Some(queued) = position.and_then(|pos| state.backlog.remove(pos)) {
            info!("Removed queued job {} ({})", job_id, queued.job.label);
            queued.tracker.cancelled();
            self.inner.publish_backlog(&state);
            self.inner.refresh_idle(&state);
            return Ok(());
        }

        Err(QueueError::UnknownJob(job_id.to_string()))
    }

    /// Drops the whole backlog, then cancels the running job.
    pub fn cancel_all(&self) {
        let mut state = self.inner.lock();

        let dropped = state.backlog.len();
        for queued in state.backlog.drain(..) {
            queued.tracker.cancelled();
        }
        if dropped > 0 {
            info!("Removed {} queued job(s)", dropped);
            self.inner.publish_backlog(&state);
        }

        if let Some(active) = state.active.take() {
            info!("Cancelling running job {} ({})", active.job.id, active.job.label);
            active.cancel.cancel();
            self.inner.promote_next(&mut state);
        }
        self.inner.refresh_idle(&state);
    }

    /// Running job first, then the backlog in execution order.
    pub fn jobs(&self) -> Vec<JobInfo> {
        let state = self.inner.lock();
        let mut jobs = Vec::with_capacity(state.backlog.len() + 1);

        if let Some(active) = state.active.as_ref() {
            jobs.push(JobInfo {
                id: active.job.id.clone(),
                label: active.job.label.clone(),
                kind: active.job.kind,
                status: JobStatus::Running,
                progress: self.inner.status.snapshot().progress_percent,
            });
        }
        jobs.extend(state.backlog.iter().map(|q| JobInfo {
            id: q.job.id.clone(),
            label: q.job.label.clone(),
            kind: q.job.kind,
            status: JobStatus::Queued,
            progress: 0,
        }));
        jobs
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().is_idle()
    }

    /// Resolves once nothing is running, queued or still unwinding.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_backlog(&self, state: &QueueState) {
        self.status.set_backlog(
            state
                .backlog
                .iter()
                .map(|q| BacklogEntry {
                    title: q.job.label.clone(),
                    job_id: q.job.id.clone(),
                })
                .collect(),
        );
    }

    fn refresh_idle(&self, state: &QueueState) {
        let idle = state.is_idle();
        self.idle.send_if_modified(|current| {
            if *current == idle {
                return false;
            }
            *current = idle;
            true
        });
    }

    /// Promotes `queued` into the active slot and spawns its pipeline.
    fn start(self: &Arc<Self>, state: &mut QueueState, queued: QueuedJob) {
        let QueuedJob { mut job, tracker } = queued;
        job.status = JobStatus::Running;

        let cancel = CancellationToken::new();
        let active_status = self
            .status
            .activate(&job.id, &format!("Downloading {}", job.label));
        let reporter = BroadcastProgress::new(tracker, active_status);

        info!("Starting job {} ({})", job.id, job.label);
        state.active = Some(ActiveJob {
            job: job.clone(),
            cancel: cancel.clone(),
        });
        state.tasks_in_flight += 1;

        let inner = Arc::clone(self);
        let pipeline = Arc::clone(&self.pipeline);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let run = tokio::spawn(async move {
                let ctx = PipelineContext::new(job, cancel);
                let (result, _ctx) = pipeline.run(ctx, &reporter).await;
                result
            });

            match run.await {
                Ok(result) => match &result.outcome {
                    JobOutcome::Succeeded { artifact, omitted } => info!(
                        "Job {} finished: {} ({} track(s) omitted)",
                        result.job_id,
                        artifact.display(),
                        omitted.len()
                    ),
                    JobOutcome::Cancelled => info!("Job {} cancelled", result.job_id),
                    JobOutcome::Failed { message, .. } => {
                        warn!("Job {} failed: {}", result.job_id, message)
                    }
                },
                Err(e) => error!("Pipeline task for job {} panicked: {}", job_id, e),
            }

            inner.on_job_terminal(&job_id);
        });
    }

    /// Moves the next backlog entry into the active slot, or returns the
    /// status indicator to idle when there is none.
    fn promote_next(self: &Arc<Self>, state: &mut QueueState) {
        match state.backlog.pop_front() {
            Some(next) => {
                self.publish_backlog(state);
                self.start(state, next);
            }
            None => {
                debug!("Backlog empty, queue idle");
                self.status.clear_active();
            }
        }
    }

    fn on_job_terminal(self: &Arc<Self>, job_id: &str) {
        let mut state = self.lock();
        state.tasks_in_flight = state.tasks_in_flight.saturating_sub(1);

        let was_active = state
            .active
            .as_ref()
            .is_some_and(|active| active.job.id == job_id);
        if was_active {
            state.active = None;
            self.promote_next(&mut state);
        }
        self.refresh_idle(&state);
    }
}
