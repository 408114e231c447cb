//! Hand-off of finished artifacts to the environment.

pub mod filesystem;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::DeliveryError;

pub use filesystem::FsDelivery;

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Takes ownership of the finished artifact and returns where it landed.
    /// `file_name` is a suggestion; sinks may alter it to avoid clobbering.
    ///
    /// The returned future may be dropped mid-write when the job is
    /// cancelled; sinks must not leave a partial artifact in that case.
    async fn deliver(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf, DeliveryError>;
}
