pub mod job;
pub mod queue;

pub use job::{Job, JobInfo, JobKind, JobOutcome, JobResult, JobTarget};
pub use queue::JobQueue;
