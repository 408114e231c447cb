use std::error::Error as _;
use std::fmt::Write;

use thiserror::Error;

use crate::error::{CatalogError, DeliveryError, PackagingError, TranscodeError, TransferError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Resolution failed: {0}")]
    Resolution(#[from] CatalogError),

    #[error("Transfer failed: {0}")]
    Transfer(#[source] TransferError),

    #[error("Transcoding failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("No tracks could be processed for {0}")]
    NoTracks(String),
}

impl From<TransferError> for PipelineError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Cancelled { .. } => PipelineError::Cancelled,
            other => PipelineError::Transfer(other),
        }
    }
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Full cause chain, one line per source, for bug reports.
    pub fn detail(&self) -> String {
        let mut detail = format!("{}", self);
        let mut source = self.source();
        while let Some(cause) = source {
            // Writing to a String cannot fail.
            let _ = write!(detail, "\ncaused by: {}", cause);
            source = cause.source();
        }
        detail
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// An album track whose post-processing failed; left out of the archive.
    TrackOmitted { entry: String, error: String },
}
