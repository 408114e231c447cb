use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::broadcast::job_progress::JobPhase;
use crate::catalog::{AlbumBundle, Catalog, QobuzCatalog, TrackAsset, TrackMetadata};
use crate::config::Config;
use crate::delivery::{DeliverySink, FsDelivery};
use crate::error::{CatalogError, QobuzDlError, TranscodeError};
use crate::packager::{
    archive_file_name, prefix_width, track_entry_name, ArchiveEntry, Packager, ZipPackager,
    COVER_ENTRY_NAME,
};
use crate::sanitize::{clean_file_name, redact_url};
use crate::transcode::{FfmpegTranscoder, Transcoder};
use crate::transfer::{HttpTransport, Transport};
use crate::worker::job::{JobResult, JobTarget};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{aggregate, percent, ProgressEvent, ProgressReporter};

/// Races `fut` against the job's cancellation token. Dropping the losing
/// future aborts whatever request or child process it was driving.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        output = fut => Ok(output),
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn phase(progress: &dyn ProgressReporter, phase: JobPhase, message: &str) {
    progress.report(ProgressEvent::Phase {
        phase,
        message: message.to_string(),
    });
}

fn set_progress(progress: &dyn ProgressReporter, phase: JobPhase, percent: u8, description: &str) {
    progress.report(ProgressEvent::Progress {
        phase,
        percent,
        description: description.to_string(),
    });
}

/// An album track queued for transfer, with its archive position.
struct PlannedTrack {
    asset: TrackAsset,
    slot: u32,
    url: String,
}

/// Streamable album tracks in `(disk, track)` order, each with a sequence
/// slot. Slots follow the full album listing: a disk's numbering is offset by
/// the number of listed tracks on lower-numbered disks, so skipped tracks keep
/// their gap and later disks never reuse an earlier slot.
pub(crate) fn plan_album_order(tracks: &[TrackAsset]) -> Vec<(u32, TrackAsset)> {
    let mut ordered: Vec<&TrackAsset> = tracks.iter().collect();
    ordered.sort_by_key(|t| (t.disk_number, t.track_number));

    let mut planned = Vec::with_capacity(ordered.len());
    let mut last_slot = 0u32;
    for track in ordered {
        let offset = tracks
            .iter()
            .filter(|t| t.disk_number < track.disk_number)
            .count() as u32;
        // Duplicate or zero track numbers still get a fresh slot.
        let slot = (offset + track.track_number).max(last_slot + 1);
        last_slot = slot;
        if track.streamable {
            planned.push((slot, track.clone()));
        }
    }
    planned
}

/// Drives one job end to end. Holds only shared collaborators; all per-run
/// state lives in the [`PipelineContext`].
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    catalog: Arc<dyn Catalog>,
    transport: Arc<dyn Transport>,
    transcoder: Arc<dyn Transcoder>,
    packager: Arc<dyn Packager>,
    delivery: Arc<dyn DeliverySink>,
}

impl Pipeline {
    /// Production constructor: builds the concrete collaborators from config.
    pub fn from_config(config: &Config, client: Client) -> Result<Self, QobuzDlError> {
        let catalog = QobuzCatalog::from_config(client.clone(), &config.catalog)?;
        Ok(Self::new(
            Arc::new(PipelineConfig::from_config(config)),
            Arc::new(catalog),
            Arc::new(HttpTransport::new(client)),
            Arc::new(FfmpegTranscoder::new(&config.ffmpeg_path)),
            Arc::new(ZipPackager::new()),
            Arc::new(FsDelivery::new(&config.output_directory)),
        ))
    }

    pub fn new(
        config: Arc<PipelineConfig>,
        catalog: Arc<dyn Catalog>,
        transport: Arc<dyn Transport>,
        transcoder: Arc<dyn Transcoder>,
        packager: Arc<dyn Packager>,
        delivery: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            config,
            catalog,
            transport,
            transcoder,
            packager,
            delivery,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for a single job.
    /// Returns a (JobResult, PipelineContext) pair.
    pub async fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        let span = info_span!("pipeline", job_id = %ctx.job.id, label = %ctx.job.label);

        let outcome = async {
            match ctx.job.target.clone() {
                JobTarget::Track { track_id, asset } => {
                    self.run_track(&mut ctx, track_id, asset, progress).await
                }
                JobTarget::Album { album_id, bundle } => {
                    self.run_album(&mut ctx, &album_id, bundle, progress).await
                }
            }
        }
        .instrument(span.clone())
        .await;

        let _enter = span.enter();
        let result = match outcome {
            Ok(artifact) => {
                let omitted = ctx.omitted_entries();
                info!(artifact = %artifact.display(), omitted = omitted.len(), "Job succeeded");
                progress.report(ProgressEvent::Succeeded {
                    artifact: artifact.display().to_string(),
                    omitted: omitted.clone(),
                });
                JobResult::success(&ctx.job, artifact, omitted)
            }
            Err(PipelineError::Cancelled) => {
                info!("Job cancelled");
                progress.report(ProgressEvent::Cancelled);
                JobResult::cancelled(&ctx.job)
            }
            Err(e) => {
                error!(error = %e, "Job failed");
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                    detail: e.detail(),
                });
                JobResult::failure(&ctx.job, &e)
            }
        };
        (result, ctx)
    }

    async fn run_track(
        &self,
        ctx: &mut PipelineContext,
        track_id: u64,
        cached: Option<TrackAsset>,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        let cancel = ctx.cancel.clone();
        check_cancelled(&cancel)?;

        // ResolvingTarget
        let (mut asset, url) = async {
            phase(progress, JobPhase::ResolvingTarget, "Resolving track...");
            let asset = match cached {
                Some(asset) => asset,
                None => cancellable(&cancel, self.catalog.resolve_track(track_id)).await??,
            };
            if !asset.streamable {
                return Err(PipelineError::from(CatalogError::NotStreamable(track_id)));
            }
            progress.report(ProgressEvent::Title(format!(
                "Downloading {}",
                asset.metadata.display_title()
            )));
            let url = cancellable(
                &cancel,
                self.catalog
                    .resolve_stream_location(track_id, self.config.quality),
            )
            .await??;
            Ok::<_, PipelineError>((asset, url))
        }
        .instrument(info_span!("resolve_target"))
        .await?;

        // ProbingSize
        async {
            set_progress(progress, JobPhase::ProbingSize, 0, "Fetching track size...");
            let size = cancellable(&cancel, self.transport.probe_size(&url)).await??;
            asset.size_bytes = Some(size);
            ctx.total_expected_bytes = size;
            set_progress(progress, JobPhase::ProbingSize, 100, "Fetching track size...");
            Ok::<_, PipelineError>(())
        }
        .instrument(info_span!("probe_size", url = %redact_url(&url)))
        .await?;

        // Transferring
        let raw = self
            .transfer(ctx, &url, progress)
            .instrument(info_span!("transfer", track_id))
            .await?;

        // PostProcessing
        let output = if self.config.skips_post_processing() {
            debug!("Stream already matches the requested output, delivering as fetched");
            raw
        } else {
            let cover = self.fetch_track_cover(&asset, &cancel).await?;
            set_progress(progress, JobPhase::PostProcessing, 100, "Applying metadata...");
            cancellable(
                &cancel,
                self.post_process(raw, &asset.metadata, cover.as_deref(), progress)
                    .instrument(info_span!("post_process", track_id)),
            )
            .await??
        };

        // Delivering
        let file_name = format!("{}.{}", asset.label(), self.config.codec.extension());
        self.deliver(ctx, output, &file_name, progress).await
    }

    async fn run_album(
        &self,
        ctx: &mut PipelineContext,
        album_id: &str,
        cached: Option<AlbumBundle>,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        let cancel = ctx.cancel.clone();
        check_cancelled(&cancel)?;

        // ResolvingTarget
        let (bundle, plan) = async {
            phase(progress, JobPhase::ResolvingTarget, "Fetching album data...");
            let bundle = match cached {
                Some(bundle) => bundle,
                None => cancellable(&cancel, self.catalog.resolve_album(album_id)).await??,
            };
            progress.report(ProgressEvent::Title(format!(
                "Downloading {}",
                bundle.display_title()
            )));

            let ordered = plan_album_order(&bundle.tracks);
            let skipped = bundle.tracks.len() - ordered.len();
            if skipped > 0 {
                debug!(skipped, "Skipping non-streamable tracks");
            }
            if ordered.is_empty() {
                return Err(PipelineError::from(CatalogError::NoStreamableTracks(
                    album_id.to_string(),
                )));
            }

            let mut plan = Vec::with_capacity(ordered.len());
            for (slot, asset) in ordered {
                let url = cancellable(
                    &cancel,
                    self.catalog
                        .resolve_stream_location(asset.source_id, self.config.quality),
                )
                .await??;
                plan.push(PlannedTrack { asset, slot, url });
            }
            Ok::<_, PipelineError>((bundle, plan))
        }
        .instrument(info_span!("resolve_target", album_id))
        .await?;

        // ProbingSize
        let mut plan = plan;
        let track_count = plan.len();
        async {
            set_progress(progress, JobPhase::ProbingSize, 0, "Fetching album size...");
            let total = plan.len() as u64;
            for (index, track) in plan.iter_mut().enumerate() {
                let size = cancellable(&cancel, self.transport.probe_size(&track.url)).await??;
                track.asset.size_bytes = Some(size);
                ctx.total_expected_bytes += size;
                set_progress(
                    progress,
                    JobPhase::ProbingSize,
                    percent(index as u64 + 1, total),
                    "Fetching album size...",
                );
            }
            debug!(expected_bytes = ctx.total_expected_bytes, "Probed album size");
            Ok::<_, PipelineError>(())
        }
        .instrument(info_span!("probe_size", tracks = track_count))
        .await?;

        // Album art is shared by every track and the archive.
        set_progress(progress, JobPhase::Transferring, 0, "Fetching album art...");
        let cover = match bundle.cover_url.as_deref() {
            Some(cover_url) => Some(
                self.transport
                    .fetch(cover_url, &|_| {}, &cancel)
                    .instrument(info_span!("transfer", url = %redact_url(cover_url)))
                    .await?,
            ),
            None => None,
        };
        check_cancelled(&cancel)?;

        // Transferring + PostProcessing, one track at a time so raw buffers
        // are released before the next fetch.
        let width = prefix_width((bundle.track_count as usize).max(bundle.tracks.len()));
        let extension = self.config.codec.extension();
        let mut entries = Vec::with_capacity(plan.len() + 1);
        for (index, track) in plan.into_iter().enumerate() {
            if index > 0 && !self.config.track_spacing.is_zero() {
                cancellable(&cancel, tokio::time::sleep(self.config.track_spacing)).await?;
            }

            let raw = self
                .transfer(ctx, &track.url, progress)
                .instrument(info_span!("transfer", track_id = track.asset.source_id))
                .await?;

            let entry_name = track_entry_name(
                track.slot,
                width,
                &track.asset.metadata.display_title(),
                extension,
            );

            if self.config.skips_post_processing() {
                entries.push(ArchiveEntry::new(entry_name, raw));
                continue;
            }

            let processed = cancellable(
                &cancel,
                self.post_process(raw, &track.asset.metadata, cover.as_deref(), progress)
                    .instrument(info_span!("post_process", track_id = track.asset.source_id)),
            )
            .await?;

            match processed {
                Ok(bytes) => entries.push(ArchiveEntry::new(entry_name, bytes)),
                Err(e) => {
                    warn!(
                        entry = %entry_name,
                        error = %e,
                        "Post-processing failed, omitting track"
                    );
                    ctx.warnings.push(PipelineWarning::TrackOmitted {
                        entry: entry_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        if entries.is_empty() {
            return Err(PipelineError::NoTracks(bundle.label()));
        }
        check_cancelled(&cancel)?;

        // Packaging
        let archive = async {
            set_progress(progress, JobPhase::Packaging, 0, "Zipping album...");
            if let Some(cover) = cover {
                entries.push(ArchiveEntry::new(COVER_ENTRY_NAME, cover));
            }
            let archive = cancellable(&cancel, self.packager.pack(entries)).await??;
            set_progress(progress, JobPhase::Packaging, 100, "Zipping album...");
            Ok::<_, PipelineError>(archive)
        }
        .instrument(info_span!("package"))
        .await?;

        // Delivering
        self.deliver(ctx, archive, &archive_file_name(&bundle.label()), progress)
            .await
    }

    /// Fetches one stream, folding its bytes into the job-wide counters.
    async fn transfer(
        &self,
        ctx: &mut PipelineContext,
        url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<u8>, PipelineError> {
        let base = ctx.total_transferred_bytes;
        let expected = ctx.total_expected_bytes;
        let start = aggregate(base, expected);
        set_progress(progress, JobPhase::Transferring, start.percent, &start.description);

        let on_progress = move |loaded: u64| {
            let current = aggregate(base + loaded, expected);
            set_progress(progress, JobPhase::Transferring, current.percent, &current.description);
        };

        let bytes = cancellable(
            &ctx.cancel,
            self.transport.fetch(url, &on_progress, &ctx.cancel),
        )
        .await??;

        ctx.total_transferred_bytes += bytes.len() as u64;
        debug!(
            bytes = bytes.len(),
            transferred = ctx.total_transferred_bytes,
            expected = ctx.total_expected_bytes,
            "Transfer finished"
        );
        Ok(bytes)
    }

    /// Cover art for a single track, only when it will be embedded.
    async fn fetch_track_cover(
        &self,
        asset: &TrackAsset,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, PipelineError> {
        if !self.config.apply_metadata || !self.config.codec.supports_cover_art() {
            return Ok(None);
        }
        let Some(cover_url) = asset.cover_url.as_deref() else {
            return Ok(None);
        };
        let cover = self
            .transport
            .fetch(cover_url, &|_| {}, cancel)
            .instrument(info_span!("transfer", url = %redact_url(cover_url)))
            .await?;
        Ok(Some(cover))
    }

    /// Conditional re-encode, then conditional tagging. Consumes the raw
    /// buffer so it is freed as soon as the engine has produced output.
    async fn post_process(
        &self,
        raw: Vec<u8>,
        metadata: &TrackMetadata,
        cover: Option<&[u8]>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<u8>, TranscodeError> {
        let codec = self.config.codec;

        let bytes = if self.config.skips_reencode() {
            raw
        } else {
            phase(progress, JobPhase::PostProcessing, "Re-encoding track...");
            self.transcoder
                .reencode(
                    &raw,
                    self.config.source_format(),
                    codec,
                    self.config.bitrate,
                )
                .await?
        };

        if !self.config.apply_metadata || !codec.supports_tags() {
            return Ok(bytes);
        }

        phase(progress, JobPhase::PostProcessing, "Applying metadata...");
        let cover = cover.filter(|_| codec.supports_cover_art());
        self.transcoder.tag(&bytes, codec, metadata, cover).await
    }

    async fn deliver(
        &self,
        ctx: &PipelineContext,
        bytes: Vec<u8>,
        file_name: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        check_cancelled(&ctx.cancel)?;
        set_progress(progress, JobPhase::Delivering, 100, "Saving file...");

        // Sinks drop partial output when their future is dropped, so a cancel
        // here leaves nothing behind.
        let file_name = clean_file_name(file_name);
        let path = cancellable(
            &ctx.cancel,
            self.delivery
                .deliver(bytes, &file_name)
                .instrument(info_span!("deliver", file_name = %file_name)),
        )
        .await??;
        Ok(path)
    }
}
