//! Builder patterns for creating catalog fixtures programmatically.

#![allow(dead_code)]

use std::time::Duration;

use qobuz_dl::catalog::{AlbumBundle, Quality, TrackAsset, TrackMetadata};
use qobuz_dl::pipeline::PipelineConfig;
use qobuz_dl::transcode::OutputCodec;

pub const ARTIST: &str = "Portishead";
pub const ALBUM: &str = "Dummy";

/// Builder for creating `TrackAsset` instances.
pub struct TrackBuilder {
    asset: TrackAsset,
}

impl TrackBuilder {
    pub fn new(source_id: u64, title: &str) -> Self {
        Self {
            asset: TrackAsset {
                source_id,
                streamable: true,
                disk_number: 1,
                track_number: 1,
                duration_secs: 240,
                size_bytes: None,
                cover_url: None,
                metadata: TrackMetadata {
                    title: title.to_string(),
                    artists: vec![ARTIST.to_string()],
                    album: ALBUM.to_string(),
                    release_date: Some("1994-08-22".to_string()),
                    ..Default::default()
                },
            },
        }
    }

    pub fn position(mut self, disk: u32, track: u32) -> Self {
        self.asset.disk_number = disk;
        self.asset.track_number = track;
        self.asset.metadata.track_number = Some(track);
        self
    }

    pub fn streamable(mut self, streamable: bool) -> Self {
        self.asset.streamable = streamable;
        self
    }

    pub fn cover_url(mut self, url: &str) -> Self {
        self.asset.cover_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> TrackAsset {
        self.asset
    }
}

/// Builder for creating `AlbumBundle` instances.
pub struct AlbumBuilder {
    bundle: AlbumBundle,
}

impl AlbumBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            bundle: AlbumBundle {
                id: id.to_string(),
                title: ALBUM.to_string(),
                version: None,
                artists: vec![ARTIST.to_string()],
                upc: None,
                duration_secs: 0,
                track_count: 0,
                genre: Some("Trip Hop".to_string()),
                release_date: Some("1994-08-22".to_string()),
                cover_url: None,
                tracks: vec![],
            },
        }
    }

    pub fn track(mut self, track: TrackAsset) -> Self {
        self.bundle.duration_secs += track.duration_secs;
        self.bundle.track_count += 1;
        self.bundle.tracks.push(track);
        self
    }

    pub fn cover_url(mut self, url: &str) -> Self {
        self.bundle.cover_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> AlbumBundle {
        self.bundle
    }
}

/// Builder for creating `PipelineConfig` instances. Defaults to a
/// pass-through configuration: CD quality FLAC, no tagging, no spacing.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig {
                quality: Quality::Cd,
                codec: OutputCodec::Flac,
                bitrate: None,
                apply_metadata: false,
                track_spacing: Duration::ZERO,
            },
        }
    }

    pub fn codec(mut self, codec: OutputCodec, bitrate: Option<u32>) -> Self {
        self.config.codec = codec;
        self.config.bitrate = bitrate;
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn apply_metadata(mut self, apply: bool) -> Self {
        self.config.apply_metadata = apply;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
