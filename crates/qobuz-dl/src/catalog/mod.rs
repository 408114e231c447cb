//! Remote catalog boundary: metadata lookup and stream-location signing.

pub mod model;
pub mod qobuz;

use async_trait::async_trait;

use crate::error::CatalogError;

pub use model::{AlbumBundle, Quality, TrackAsset, TrackMetadata};
pub use qobuz::QobuzCatalog;

/// Resolves identifiers to metadata and to temporary, authenticated byte-stream locations.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up one track's metadata.
    async fn resolve_track(&self, track_id: u64) -> Result<TrackAsset, CatalogError>;

    /// Looks up an album with its full track list.
    async fn resolve_album(&self, album_id: &str) -> Result<AlbumBundle, CatalogError>;

    /// Returns a signed, time-limited URL for the track's audio at `quality`.
    async fn resolve_stream_location(
        &self,
        track_id: u64,
        quality: Quality,
    ) -> Result<String, CatalogError>;
}
