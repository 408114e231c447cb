//! In-memory collaborators that record every call they receive.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use qobuz_dl::catalog::{AlbumBundle, Catalog, Quality, TrackAsset, TrackMetadata};
use qobuz_dl::delivery::DeliverySink;
use qobuz_dl::error::{CatalogError, DeliveryError, TranscodeError, TransferError};
use qobuz_dl::pipeline::{ProgressEvent, ProgressReporter};
use qobuz_dl::transcode::{OutputCodec, SourceFormat, Transcoder};
use qobuz_dl::transfer::{OnProgress, Transport};

/// Marker prefix that makes [`FakeTranscoder`] fail on an input.
pub const BROKEN_AUDIO: &[u8] = b"broken:";

pub fn stream_url(track_id: u64) -> String {
    format!("https://stream.test/{}.flac?sig=abc", track_id)
}

#[derive(Default)]
pub struct FakeCatalog {
    tracks: Mutex<HashMap<u64, TrackAsset>>,
    albums: Mutex<HashMap<String, AlbumBundle>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn add_track(&self, track: TrackAsset) {
        self.tracks.lock().unwrap().insert(track.source_id, track);
    }

    pub fn add_album(&self, album: AlbumBundle) {
        self.albums.lock().unwrap().insert(album.id.clone(), album);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn resolve_track(&self, track_id: u64) -> Result<TrackAsset, CatalogError> {
        self.record(format!("track:{}", track_id));
        self.tracks
            .lock()
            .unwrap()
            .get(&track_id)
            .cloned()
            .ok_or_else(|| CatalogError::Status {
                endpoint: "track/get".to_string(),
                status: 404,
                body: "not found".to_string(),
            })
    }

    async fn resolve_album(&self, album_id: &str) -> Result<AlbumBundle, CatalogError> {
        self.record(format!("album:{}", album_id));
        self.albums
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .ok_or_else(|| CatalogError::Status {
                endpoint: "album/get".to_string(),
                status: 404,
                body: "not found".to_string(),
            })
    }

    async fn resolve_stream_location(
        &self,
        track_id: u64,
        _quality: Quality,
    ) -> Result<String, CatalogError> {
        self.record(format!("stream:{}", track_id));
        Ok(stream_url(track_id))
    }
}

/// Serves fixed payloads by URL. Held URLs park their fetch until the job
/// is cancelled.
#[derive(Default)]
pub struct FakeTransport {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    held: Mutex<HashSet<String>>,
    probes: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
    /// Signalled once per held fetch that has started.
    pub fetch_held: Notify,
}

impl FakeTransport {
    pub fn serve(&self, url: impl Into<String>, bytes: &[u8]) {
        self.payloads
            .lock()
            .unwrap()
            .insert(url.into(), bytes.to_vec());
    }

    pub fn hold(&self, url: impl Into<String>) {
        self.held.lock().unwrap().insert(url.into());
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn probe_size(&self, url: &str) -> Result<u64, TransferError> {
        self.probes.lock().unwrap().push(url.to_string());
        Ok(self
            .payloads
            .lock()
            .unwrap()
            .get(url)
            .map(|b| b.len() as u64)
            .unwrap_or(0))
    }

    async fn fetch(
        &self,
        url: &str,
        on_progress: OnProgress<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransferError> {
        self.fetches.lock().unwrap().push(url.to_string());

        let is_held = self.held.lock().unwrap().contains(url);
        if is_held {
            self.fetch_held.notify_one();
            cancel.cancelled().await;
            return Err(TransferError::Cancelled {
                url: url.to_string(),
            });
        }

        let bytes = self
            .payloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransferError::Status {
                url: url.to_string(),
                status: 404,
            })?;
        on_progress(bytes.len() as u64 / 2);
        on_progress(bytes.len() as u64);
        Ok(bytes)
    }
}

/// Prefixes its input with `enc:` / `tag:` so tests can see which steps ran.
#[derive(Default)]
pub struct FakeTranscoder {
    calls: Mutex<Vec<String>>,
    covers: Mutex<Vec<Vec<u8>>>,
}

impl FakeTranscoder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn covers(&self) -> Vec<Vec<u8>> {
        self.covers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn reencode(
        &self,
        input: &[u8],
        _source: SourceFormat,
        codec: OutputCodec,
        bitrate: Option<u32>,
    ) -> Result<Vec<u8>, TranscodeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("reencode:{}:{:?}", codec, bitrate));
        if input.starts_with(BROKEN_AUDIO) {
            return Err(TranscodeError::Engine {
                step: "re-encode",
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        Ok([b"enc:".as_slice(), input].concat())
    }

    async fn tag(
        &self,
        input: &[u8],
        codec: OutputCodec,
        tags: &TrackMetadata,
        cover: Option<&[u8]>,
    ) -> Result<Vec<u8>, TranscodeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("tag:{}:{}", codec, tags.title));
        if let Some(cover) = cover {
            self.covers.lock().unwrap().push(cover.to_vec());
        }
        Ok([b"tag:".as_slice(), input].concat())
    }
}

#[derive(Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
    held: Mutex<HashSet<String>>,
    /// Signalled once per held delivery that has started.
    pub delivery_held: Notify,
}

impl RecordingDelivery {
    /// Deliveries of `file_name` never complete and record nothing.
    pub fn hold(&self, file_name: impl Into<String>) {
        self.held.lock().unwrap().insert(file_name.into());
    }

    pub fn delivered(&self) -> Vec<(String, Vec<u8>)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingDelivery {
    async fn deliver(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf, DeliveryError> {
        let is_held = self.held.lock().unwrap().contains(file_name);
        if is_held {
            self.delivery_held.notify_one();
            std::future::pending::<()>().await;
        }

        self.delivered
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes));
        Ok(PathBuf::from("/downloads").join(file_name))
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
