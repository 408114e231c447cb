use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{OnProgress, Transport};
use crate::error::TransferError;
use crate::sanitize::redact_url;

/// Plain HTTP(S) transport. Signed stream locations carry credentials in the
/// query string, so only redacted URLs reach errors and logs.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn parse_content_length(value: Option<&reqwest::header::HeaderValue>) -> u64 {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe_size(&self, url: &str) -> Result<u64, TransferError> {
        let redacted = redact_url(url);
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| TransferError::Request {
                url: redacted.clone(),
                source: e.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: redacted,
                status: status.as_u16(),
            });
        }

        let size = parse_content_length(response.headers().get(CONTENT_LENGTH));
        debug!(url = %redacted, size, "Probed stream size");
        Ok(size)
    }

    async fn fetch(
        &self,
        url: &str,
        on_progress: OnProgress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransferError> {
        let redacted = redact_url(url);
        let cancelled = || TransferError::Cancelled {
            url: redacted.clone(),
        };

        let send = self.client.get(url).send();
        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = send => result.map_err(|e| TransferError::Request {
                url: redacted.clone(),
                source: e.without_url(),
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: redacted.clone(),
                status: status.as_u16(),
            });
        }

        let mut bytes = Vec::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                chunk = response.chunk() => chunk.map_err(|e| TransferError::Interrupted {
                    url: redacted.clone(),
                    received: bytes.len() as u64,
                    source: e.without_url(),
                })?,
            };
            match chunk {
                Some(chunk) => {
                    bytes.extend_from_slice(&chunk);
                    on_progress(bytes.len() as u64);
                }
                None => break,
            }
        }

        debug!(url = %redacted, bytes = bytes.len(), "Fetched stream");
        Ok(bytes)
    }
}
