//! Byte-stream size probes and fetches.

pub mod http;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;

pub use http::HttpTransport;

/// Receives the cumulative number of bytes loaded so far for one fetch.
pub type OnProgress<'a> = &'a (dyn Fn(u64) + Send + Sync);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Metadata-only size query. A stream that does not advertise its length reports 0.
    async fn probe_size(&self, url: &str) -> Result<u64, TransferError>;

    /// Fetches the full stream. Tripping `cancel` aborts the request in flight.
    async fn fetch(
        &self,
        url: &str,
        on_progress: OnProgress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransferError>;
}
