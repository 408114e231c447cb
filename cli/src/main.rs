use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info};
use qobuz_dl::broadcast::{JobProgressEvent, JobStatus};
use qobuz_dl::config::validate_bitrate;
use qobuz_dl::{
    load_config, Config, JobProgressBroadcaster, JobQueue, JobTarget, OutputCodec, Pipeline,
    Quality, StatusPublisher, StatusSnapshot,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "qobuz-dl",
    version,
    about = "Download tracks and albums through a sequential job queue"
)]
struct Cli {
    /// Configuration file (YAML or JSON).
    #[arg(short, long, default_value = "qobuz-dl.yaml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Stream quality format id: 27, 7, 6 or 5.
    #[arg(long)]
    quality: Option<String>,

    /// Output codec: FLAC, WAV, ALAC, MP3, AAC or OPUS.
    #[arg(long)]
    codec: Option<String>,

    /// Target bitrate in kbps for lossy codecs.
    #[arg(long)]
    bitrate: Option<u32>,

    /// Skip writing tags and cover art.
    #[arg(long)]
    no_metadata: bool,

    /// Directory finished files are written to.
    #[arg(short, long)]
    output: Option<String>,

    #[command(subcommand)]
    target: Target,
}

#[derive(Subcommand, Debug)]
enum Target {
    /// Download single tracks, one job per id.
    Track {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Download whole albums as zip archives, one job per id.
    Album {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl Target {
    fn into_jobs(self) -> Vec<JobTarget> {
        match self {
            Target::Track { ids } => ids.into_iter().map(JobTarget::track).collect(),
            Target::Album { ids } => ids.into_iter().map(JobTarget::album).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.debug) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    // The queue logs through the `log` facade.
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(quality) = cli.quality.as_deref() {
        config.download.quality = Quality::from_format_id(quality)
            .ok_or_else(|| anyhow!("Unknown quality '{}', expected 27, 7, 6 or 5", quality))?;
    }
    if let Some(codec) = cli.codec.as_deref() {
        config.download.codec = OutputCodec::from_name(codec)
            .ok_or_else(|| anyhow!("Unknown codec '{}'", codec))?;
    }
    if let Some(bitrate) = cli.bitrate {
        validate_bitrate(Some(bitrate))?;
        config.download.bitrate = Some(bitrate);
    }
    if cli.no_metadata {
        config.download.apply_metadata = false;
    }
    if let Some(output) = cli.output.as_ref() {
        config.output_directory = output.clone();
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {prefix} [{bar:40}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
    bar.set_style(style);
    bar
}

fn render_snapshot(bar: &ProgressBar, snapshot: &StatusSnapshot) {
    if !snapshot.processing {
        bar.set_prefix("Idle");
        bar.set_position(0);
        bar.set_message(String::new());
        return;
    }

    bar.set_prefix(snapshot.title.clone());
    bar.set_position(u64::from(snapshot.progress_percent));
    if snapshot.backlog.is_empty() {
        bar.set_message(snapshot.description.clone());
    } else {
        bar.set_message(format!(
            "{} ({} queued)",
            snapshot.description,
            snapshot.backlog.len()
        ));
    }
}

/// Prints terminal job events above the bar. Returns true for failures.
fn report_event(bar: &ProgressBar, event: &JobProgressEvent) -> bool {
    match event.status {
        JobStatus::Succeeded => {
            let artifact = event.artifact.as_deref().unwrap_or_default();
            bar.println(format!("Finished {} -> {}", event.label, artifact));
            for entry in &event.omitted {
                bar.println(format!("  omitted: {}", entry));
            }
            false
        }
        JobStatus::Cancelled => {
            bar.println(format!("Cancelled {}", event.label));
            false
        }
        JobStatus::Failed => {
            let reason = event.error.as_deref().unwrap_or(&event.message);
            bar.println(format!("Failed {}: {}", event.label, reason));
            if let Some(detail) = event.detail.as_deref() {
                log::debug!("{}", detail);
            }
            true
        }
        JobStatus::Queued | JobStatus::Running => false,
    }
}

/// Runs every requested job to completion. Returns false when any job failed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli)?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("qobuz-dl/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let pipeline = Arc::new(Pipeline::from_config(&config, client)?);

    let status = StatusPublisher::new(config.status_capacity);
    let events = JobProgressBroadcaster::new(config.status_capacity);
    let mut status_rx = status.subscribe();
    let mut events_rx = events.subscribe();
    let queue = JobQueue::new(pipeline, status, events);

    info!(
        "Writing to {} as {} ({})",
        config.output_directory, config.download.codec, config.download.quality
    );
    for target in cli.target.into_jobs() {
        queue.submit(target);
    }

    let bar = progress_bar();
    render_snapshot(&bar, &queue.status().snapshot());

    let mut failed = 0usize;
    let mut interrupted = false;
    let idle = queue.wait_idle();
    tokio::pin!(idle);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut idle => break,
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    continue;
                }
                bar.println("Interrupted, cancelling all jobs");
                queue.cancel_all();
            }
            snapshot = status_rx.recv() => match snapshot {
                Ok(snapshot) => render_snapshot(&bar, &snapshot),
                Err(RecvError::Lagged(_)) => render_snapshot(&bar, &queue.status().snapshot()),
                Err(RecvError::Closed) => break,
            },
            event = events_rx.recv() => match event {
                Ok(event) => {
                    if report_event(&bar, &event) {
                        failed += 1;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} job event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Terminal events are sent before the queue reports idle.
    while let Ok(event) = events_rx.try_recv() {
        if report_event(&bar, &event) {
            failed += 1;
        }
    }
    bar.finish_and_clear();

    if failed > 0 {
        error!("{} job(s) failed", failed);
    }
    Ok(failed == 0)
}
