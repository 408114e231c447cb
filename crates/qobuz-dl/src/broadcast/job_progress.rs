//! Job lifecycle broadcaster for real-time job event streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stage a job is in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    ResolvingTarget,
    ProbingSize,
    Transferring,
    PostProcessing,
    Packaging,
    Delivering,
    Succeeded,
    Cancelled,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::Cancelled | JobPhase::Failed
        )
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::ResolvingTarget => write!(f, "Resolving target"),
            JobPhase::ProbingSize => write!(f, "Probing size"),
            JobPhase::Transferring => write!(f, "Transferring"),
            JobPhase::PostProcessing => write!(f, "Post-processing"),
            JobPhase::Packaging => write!(f, "Packaging"),
            JobPhase::Delivering => write!(f, "Delivering"),
            JobPhase::Succeeded => write!(f, "Succeeded"),
            JobPhase::Cancelled => write!(f, "Cancelled"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

impl From<JobPhase> for JobStatus {
    fn from(phase: JobPhase) -> Self {
        match phase {
            JobPhase::Queued => JobStatus::Queued,
            JobPhase::Succeeded => JobStatus::Succeeded,
            JobPhase::Cancelled => JobStatus::Cancelled,
            JobPhase::Failed => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }
}

/// Lifecycle event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Display label, `artists - title`.
    pub label: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Stage-local percentage, when the event carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub timestamp: DateTime<Utc>,
    /// Where the finished artifact landed (set on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Album tracks left out after a post-processing failure (set on success).
    #[serde(default)]
    pub omitted: Vec<String>,
    /// Short error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Full error chain for bug reports (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, label: &str, phase: JobPhase, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            label: label.to_string(),
            phase,
            status: phase.into(),
            message: message.to_string(),
            progress: None,
            timestamp: Utc::now(),
            artifact: None,
            omitted: vec![],
            error: None,
            detail: None,
        }
    }

    pub fn progress(
        job_id: &str,
        label: &str,
        phase: JobPhase,
        percent: u8,
        message: &str,
    ) -> Self {
        Self {
            progress: Some(percent.min(100)),
            ..Self::new(job_id, label, phase, message)
        }
    }

    pub fn succeeded(job_id: &str, label: &str, artifact: &str, omitted: &[String]) -> Self {
        let message = if omitted.is_empty() {
            "Download completed".to_string()
        } else {
            format!("Download completed, {} track(s) omitted", omitted.len())
        };
        Self {
            progress: Some(100),
            artifact: Some(artifact.to_string()),
            omitted: omitted.to_vec(),
            ..Self::new(job_id, label, JobPhase::Succeeded, &message)
        }
    }

    pub fn cancelled(job_id: &str, label: &str) -> Self {
        Self::new(job_id, label, JobPhase::Cancelled, "Download cancelled")
    }

    pub fn failed(job_id: &str, label: &str, error: &str, detail: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            detail: Some(detail.to_string()),
            ..Self::new(job_id, label, JobPhase::Failed, "Download failed")
        }
    }
}

/// Broadcasts job lifecycle events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for a newly admitted job and announces it as queued.
    pub fn start_job(&self, job_id: &str, label: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, label, Arc::clone(&self.sender));

        tracker.update_phase(JobPhase::Queued, "Job queued for download");

        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Emits events for a single job.
#[derive(Clone)]
pub struct JobProgressTracker {
    job_id: String,
    label: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(
        job_id: &str,
        label: &str,
        sender: Arc<broadcast::Sender<JobProgressEvent>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            label: label.to_string(),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn update_phase(&self, phase: JobPhase, message: &str) {
        let _ = self
            .sender
            .send(JobProgressEvent::new(&self.job_id, &self.label, phase, message));
    }

    pub fn update_progress(&self, phase: JobPhase, percent: u8, message: &str) {
        let _ = self.sender.send(JobProgressEvent::progress(
            &self.job_id,
            &self.label,
            phase,
            percent,
            message,
        ));
    }

    pub fn succeeded(&self, artifact: &str, omitted: &[String]) {
        let _ = self.sender.send(JobProgressEvent::succeeded(
            &self.job_id,
            &self.label,
            artifact,
            omitted,
        ));
    }

    pub fn cancelled(&self) {
        let _ = self
            .sender
            .send(JobProgressEvent::cancelled(&self.job_id, &self.label));
    }

    pub fn failed(&self, error: &str, detail: &str) {
        let _ = self.sender.send(JobProgressEvent::failed(
            &self.job_id,
            &self.label,
            error,
            detail,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobProgressEvent::new(
            "test-job",
            "Artist - Song",
            JobPhase::Transferring,
            "Testing",
        ));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "test-job");
        assert_eq!(received.label, "Artist - Song");
        assert_eq!(received.phase, JobPhase::Transferring);
        assert_eq!(received.status, JobStatus::Running);
    }

    #[test]
    fn test_start_job_emits_queued() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job("job-1", "Artist - Album");

        let received = rx.try_recv().unwrap();
        assert_eq!(received.phase, JobPhase::Queued);
        assert_eq!(received.status, JobStatus::Queued);

        tracker.update_progress(JobPhase::ProbingSize, 50, "Fetching album size...");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.phase, JobPhase::ProbingSize);
        assert_eq!(received.progress, Some(50));
    }

    #[test]
    fn test_success_carries_artifact_and_omissions() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = broadcaster.start_job("job-2", "Artist - Album");
        let _ = rx.try_recv();

        tracker.succeeded("/music/Artist - Album.zip", &["02 Broken".to_string()]);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.status, JobStatus::Succeeded);
        assert_eq!(received.progress, Some(100));
        assert_eq!(
            received.artifact.as_deref(),
            Some("/music/Artist - Album.zip")
        );
        assert_eq!(received.omitted, vec!["02 Broken".to_string()]);
    }

    #[test]
    fn test_failure_and_cancellation_are_distinct() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = broadcaster.start_job("job-3", "x");
        let _ = rx.try_recv();

        tracker.failed("Transfer failed", "Transfer failed\ncaused by: reset");
        tracker.cancelled();

        let failed = rx.try_recv().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Transfer failed"));
        assert!(failed.detail.unwrap().contains("caused by"));

        let cancelled = rx.try_recv().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.error.is_none());
    }

    #[test]
    fn test_terminal_phases() {
        assert!(JobPhase::Succeeded.is_terminal());
        assert!(JobPhase::Cancelled.is_terminal());
        assert!(!JobPhase::Delivering.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
