use std::sync::Mutex;

use crate::broadcast::job_progress::{JobPhase, JobProgressTracker};
use crate::broadcast::status::ActiveStatus;

const BYTE_UNITS: [&str; 6] = ["Bytes", "KB", "MB", "GB", "TB", "PB"];

/// Percentage of `done` over `total`, floored and clamped to 0..=100.
/// An unknown or empty total reports 0.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (done as u128 * 100) / total as u128;
    pct.min(100) as u8
}

/// Human-readable byte count: `0 Bytes`, `512 Bytes`, `3 MB`, `1.46 GB`.
///
/// 1024-based units; whole numbers below GB, up to two decimals from GB up.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut size = bytes as f64;
    while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let decimals = if unit >= 3 { 2 } else { 0 };
    let formatted = format!("{:.*}", decimals, size);
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, fraction.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let whole = group_thousands(whole);
    if fraction.is_empty() {
        format!("{} {}", whole, BYTE_UNITS[unit])
    } else {
        format!("{}.{} {}", whole, fraction, BYTE_UNITS[unit])
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Combined view of one or more transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateProgress {
    pub percent: u8,
    /// `"X / Y"` in human-readable units.
    pub description: String,
}

/// Folds cumulative transferred bytes against the expected total.
pub fn aggregate(transferred: u64, expected: u64) -> AggregateProgress {
    AggregateProgress {
        percent: percent(transferred, expected),
        description: format!("{} / {}", format_bytes(transferred), format_bytes(expected)),
    }
}

/// Events emitted by the pipeline during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Status title for the running job, once the target is known.
    Title(String),
    Phase {
        phase: JobPhase,
        message: String,
    },
    Progress {
        phase: JobPhase,
        percent: u8,
        description: String,
    },
    Succeeded {
        artifact: String,
        omitted: Vec<String>,
    },
    Cancelled,
    Failed {
        error: String,
        detail: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Bridges pipeline events to the status indicator and the job event stream.
///
/// Byte-level progress arrives per network chunk; job events are only
/// emitted when the percentage or phase actually changes.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
    status: ActiveStatus,
    last_progress: Mutex<Option<(JobPhase, u8)>>,
}

impl BroadcastProgress {
    pub fn new(tracker: JobProgressTracker, status: ActiveStatus) -> Self {
        Self {
            tracker,
            status,
            last_progress: Mutex::new(None),
        }
    }

    fn progress_changed(&self, phase: JobPhase, percent: u8) -> bool {
        match self.last_progress.lock() {
            Ok(mut last) => {
                if *last == Some((phase, percent)) {
                    return false;
                }
                *last = Some((phase, percent));
                true
            }
            Err(_) => true,
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Title(title) => {
                self.status.set_title(&title);
            }
            ProgressEvent::Phase { phase, message } => {
                self.status.set_description(&message);
                self.tracker.update_phase(phase, &message);
            }
            ProgressEvent::Progress {
                phase,
                percent,
                description,
            } => {
                self.status.set(percent, &description);
                if self.progress_changed(phase, percent) {
                    self.tracker.update_progress(phase, percent, &description);
                }
            }
            ProgressEvent::Succeeded { artifact, omitted } => {
                self.tracker.succeeded(&artifact, &omitted);
            }
            ProgressEvent::Cancelled => {
                self.tracker.cancelled();
            }
            ProgressEvent::Failed { error, detail } => {
                self.tracker.failed(&error, &detail);
            }
        }
    }
}
