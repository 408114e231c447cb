//! Broadcasting modules for real-time event streaming.
//!
//! [`StatusPublisher`] carries the single status indicator; the job
//! broadcaster carries per-job lifecycle events.

pub mod job_progress;
pub mod status;

pub use job_progress::{
    JobPhase, JobProgressBroadcaster, JobProgressEvent, JobProgressTracker, JobStatus,
};
pub use status::{ActiveStatus, BacklogEntry, StatusPublisher, StatusSnapshot};
