use std::time::Duration;

use crate::catalog::Quality;
use crate::config::Config;
use crate::transcode::{OutputCodec, SourceFormat};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub quality: Quality,
    pub codec: OutputCodec,
    pub bitrate: Option<u32>,
    pub apply_metadata: bool,
    /// Pause between successive album track transfers.
    pub track_spacing: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quality: config.download.quality,
            codec: config.download.codec,
            bitrate: config.download.bitrate,
            apply_metadata: config.download.apply_metadata,
            track_spacing: Duration::from_millis(config.track_spacing_ms),
        }
    }

    pub fn source_format(&self) -> SourceFormat {
        SourceFormat::for_quality(self.quality)
    }

    /// The served stream already is the requested codec and bitrate.
    pub fn skips_reencode(&self) -> bool {
        self.source_format().matches(self.codec, self.bitrate)
    }

    /// Nothing to do between fetch and delivery.
    pub fn skips_post_processing(&self) -> bool {
        self.skips_reencode() && !self.apply_metadata
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            codec: OutputCodec::default(),
            bitrate: Some(320),
            apply_metadata: true,
            track_spacing: Duration::from_millis(100),
        }
    }
}
