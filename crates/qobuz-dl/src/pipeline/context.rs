use tokio_util::sync::CancellationToken;

use crate::worker::job::Job;

use super::error::PipelineWarning;

/// Mutable state of one pipeline run. Owned by that run and dropped with it.
pub struct PipelineContext {
    pub job: Job,

    pub cancel: CancellationToken,

    // Filled in while probing sizes
    pub total_expected_bytes: u64,

    // Grows as each transfer completes
    pub total_transferred_bytes: u64,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job, cancel: CancellationToken) -> Self {
        Self {
            job,
            cancel,
            total_expected_bytes: 0,
            total_transferred_bytes: 0,
            warnings: Vec::new(),
        }
    }

    /// Names of album entries left out after post-processing failures.
    pub fn omitted_entries(&self) -> Vec<String> {
        self.warnings
            .iter()
            .map(|w| match w {
                PipelineWarning::TrackOmitted { entry, .. } => entry.clone(),
            })
            .collect()
    }
}
