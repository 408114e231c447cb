//! Test harness wiring the in-memory fakes into a pipeline and a queue.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use qobuz_dl::broadcast::{JobProgressBroadcaster, StatusPublisher};
use qobuz_dl::pipeline::{Pipeline, PipelineConfig, PipelineContext};
use qobuz_dl::packager::ZipPackager;
use qobuz_dl::worker::{Job, JobQueue, JobResult, JobTarget};

use super::builders::PipelineConfigBuilder;
use super::fakes::{
    FakeCatalog, FakeTranscoder, FakeTransport, RecordingDelivery, RecordingProgress,
};

/// Upper bound for anything a test awaits.
pub const WAIT: Duration = Duration::from_secs(5);

/// Everything a direct pipeline run leaves behind.
pub struct RunOutput {
    pub result: JobResult,
    pub progress: RecordingProgress,
    pub ctx: PipelineContext,
}

pub struct TestHarness {
    pub catalog: Arc<FakeCatalog>,
    pub transport: Arc<FakeTransport>,
    pub transcoder: Arc<FakeTranscoder>,
    pub delivery: Arc<RecordingDelivery>,
    pub pipeline: Arc<Pipeline>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfigBuilder::new().build())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let catalog = Arc::new(FakeCatalog::default());
        let transport = Arc::new(FakeTransport::default());
        let transcoder = Arc::new(FakeTranscoder::default());
        let delivery = Arc::new(RecordingDelivery::default());

        let pipeline = Arc::new(Pipeline::new(
            Arc::new(config),
            catalog.clone(),
            transport.clone(),
            transcoder.clone(),
            Arc::new(ZipPackager::new()),
            delivery.clone(),
        ));

        Self {
            catalog,
            transport,
            transcoder,
            delivery,
            pipeline,
        }
    }

    /// Runs one job directly through the pipeline, outside any queue.
    pub async fn run(&self, target: JobTarget) -> RunOutput {
        self.run_with_token(target, CancellationToken::new()).await
    }

    pub async fn run_with_token(&self, target: JobTarget, cancel: CancellationToken) -> RunOutput {
        let progress = RecordingProgress::default();
        let ctx = PipelineContext::new(Job::new(target), cancel);
        let (result, ctx) = tokio::time::timeout(WAIT, self.pipeline.run(ctx, &progress))
            .await
            .expect("pipeline run timed out");
        RunOutput {
            result,
            progress,
            ctx,
        }
    }

    pub fn queue(&self) -> JobQueue {
        JobQueue::new(
            Arc::clone(&self.pipeline),
            StatusPublisher::new(256),
            JobProgressBroadcaster::new(256),
        )
    }
}

/// Entry names and contents of a zip archive, in archive order.
pub fn read_archive(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip archive");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("archive entry");
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).expect("entry contents");
            (file.name().to_string(), contents)
        })
        .collect()
}
