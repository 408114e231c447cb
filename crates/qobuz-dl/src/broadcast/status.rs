//! Observable status indicator shared by the queue and the active pipeline.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One queued job as shown in the backlog list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogEntry {
    pub title: String,
    pub job_id: String,
}

/// Point-in-time view of the status indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub title: String,
    pub description: String,
    pub progress_percent: u8,
    pub processing: bool,
    pub backlog: Vec<BacklogEntry>,
}

struct State {
    snapshot: StatusSnapshot,
    /// Job currently allowed to write the active fields.
    active_job: Option<String>,
}

struct Inner {
    state: Mutex<State>,
    sender: broadcast::Sender<StatusSnapshot>,
}

/// Publishes [`StatusSnapshot`]s to any number of subscribers.
///
/// The active fields (title, description, percentage, processing flag) are
/// written only through an [`ActiveStatus`] handle bound to the running job;
/// the backlog is written only by the queue.
#[derive(Clone)]
pub struct StatusPublisher {
    inner: Arc<Inner>,
}

impl StatusPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    snapshot: StatusSnapshot::default(),
                    active_job: None,
                }),
                sender,
            }),
        }
    }

    /// Subscribes to future snapshots. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.inner.sender.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes under the lock so subscribers see updates in write order.
    fn publish(&self, state: &State) {
        // Ignore errors - no active receivers is fine
        let _ = self.inner.sender.send(state.snapshot.clone());
    }

    /// Hands the active fields to `job_id` and resets them for a fresh run.
    pub(crate) fn activate(&self, job_id: &str, title: &str) -> ActiveStatus {
        let mut state = self.lock();
        state.active_job = Some(job_id.to_string());
        state.snapshot.title = title.to_string();
        state.snapshot.description = String::new();
        state.snapshot.progress_percent = 0;
        state.snapshot.processing = true;
        self.publish(&state);

        ActiveStatus {
            publisher: self.clone(),
            job_id: job_id.to_string(),
        }
    }

    /// Returns the indicator to idle, revoking any active writer.
    pub(crate) fn clear_active(&self) {
        let mut state = self.lock();
        state.active_job = None;
        state.snapshot.title = String::new();
        state.snapshot.description = String::new();
        state.snapshot.progress_percent = 0;
        state.snapshot.processing = false;
        self.publish(&state);
    }

    pub(crate) fn set_backlog(&self, backlog: Vec<BacklogEntry>) {
        let mut state = self.lock();
        if state.snapshot.backlog == backlog {
            return;
        }
        state.snapshot.backlog = backlog;
        self.publish(&state);
    }

    fn update_active<F>(&self, job_id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut StatusSnapshot) -> bool,
    {
        let mut state = self.lock();
        if state.active_job.as_deref() != Some(job_id) {
            return false;
        }
        if apply(&mut state.snapshot) {
            self.publish(&state);
        }
        true
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Write access to the active status fields for one running job.
///
/// Once the queue moves on (or the job is cancelled) writes through a stale
/// handle are dropped and report `false`.
#[derive(Clone)]
pub struct ActiveStatus {
    publisher: StatusPublisher,
    job_id: String,
}

impl ActiveStatus {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn set_title(&self, title: &str) -> bool {
        self.publisher.update_active(&self.job_id, |s| {
            if s.title == title {
                return false;
            }
            s.title = title.to_string();
            true
        })
    }

    pub fn set_description(&self, description: &str) -> bool {
        self.publisher.update_active(&self.job_id, |s| {
            if s.description == description {
                return false;
            }
            s.description = description.to_string();
            true
        })
    }

    pub fn set_progress(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        self.publisher.update_active(&self.job_id, |s| {
            if s.progress_percent == percent {
                return false;
            }
            s.progress_percent = percent;
            true
        })
    }

    /// Sets percentage and description as one update.
    pub fn set(&self, percent: u8, description: &str) -> bool {
        let percent = percent.min(100);
        self.publisher.update_active(&self.job_id, |s| {
            if s.progress_percent == percent && s.description == description {
                return false;
            }
            s.progress_percent = percent;
            s.description = description.to_string();
            true
        })
    }

    pub fn is_current(&self) -> bool {
        self.publisher.lock().active_job.as_deref() == Some(self.job_id.as_str())
    }
}
