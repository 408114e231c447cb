use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::broadcast::job_progress::JobStatus;
use crate::catalog::{AlbumBundle, TrackAsset};
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SingleTrack,
    Album,
}

/// What a job downloads. Descriptors already looked up elsewhere can be
/// handed over so the pipeline does not resolve them again.
#[derive(Debug, Clone)]
pub enum JobTarget {
    Track {
        track_id: u64,
        asset: Option<TrackAsset>,
    },
    Album {
        album_id: String,
        bundle: Option<AlbumBundle>,
    },
}

impl JobTarget {
    pub fn track(track_id: u64) -> Self {
        JobTarget::Track {
            track_id,
            asset: None,
        }
    }

    pub fn album(album_id: impl Into<String>) -> Self {
        JobTarget::Album {
            album_id: album_id.into(),
            bundle: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobTarget::Track { .. } => JobKind::SingleTrack,
            JobTarget::Album { .. } => JobKind::Album,
        }
    }

    /// Display label: `artists - title` when known, the bare id otherwise.
    pub fn label(&self) -> String {
        match self {
            JobTarget::Track {
                asset: Some(asset), ..
            } => asset.label(),
            JobTarget::Track { track_id, .. } => format!("Track {}", track_id),
            JobTarget::Album {
                bundle: Some(bundle),
                ..
            } => bundle.label(),
            JobTarget::Album { album_id, .. } => format!("Album {}", album_id),
        }
    }
}

impl From<TrackAsset> for JobTarget {
    fn from(asset: TrackAsset) -> Self {
        JobTarget::Track {
            track_id: asset.source_id,
            asset: Some(asset),
        }
    }
}

impl From<AlbumBundle> for JobTarget {
    fn from(bundle: AlbumBundle) -> Self {
        JobTarget::Album {
            album_id: bundle.id.clone(),
            bundle: Some(bundle),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub label: String,
    pub kind: JobKind,
    pub target: JobTarget,
    pub status: JobStatus,
}

impl Job {
    pub fn new(target: JobTarget) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: target.label(),
            kind: target.kind(),
            target,
            status: JobStatus::Queued,
        }
    }
}

/// Snapshot of a queued or running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub label: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        artifact: PathBuf,
        /// Album entries left out after post-processing failures.
        omitted: Vec<String>,
    },
    Cancelled,
    Failed {
        message: String,
        detail: String,
    },
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub label: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn success(job: &Job, artifact: PathBuf, omitted: Vec<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            label: job.label.clone(),
            outcome: JobOutcome::Succeeded { artifact, omitted },
        }
    }

    pub fn cancelled(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            label: job.label.clone(),
            outcome: JobOutcome::Cancelled,
        }
    }

    pub fn failure(job: &Job, error: &PipelineError) -> Self {
        Self {
            job_id: job.id.clone(),
            label: job.label.clone(),
            outcome: JobOutcome::Failed {
                message: error.to_string(),
                detail: error.detail(),
            },
        }
    }

    pub fn status(&self) -> JobStatus {
        match self.outcome {
            JobOutcome::Succeeded { .. } => JobStatus::Succeeded,
            JobOutcome::Cancelled => JobStatus::Cancelled,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}
