use serde::{Deserialize, Serialize};

use crate::catalog::Quality;
use crate::secrets::SecretSource;
use crate::transcode::OutputCodec;

pub const CONFIG_VERSION: &str = "1.0";
pub const MIN_BITRATE_KBPS: u32 = 24;
pub const MAX_BITRATE_KBPS: u32 = 320;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Pause between successive track transfers of an album.
    #[serde(default = "default_track_spacing_ms")]
    pub track_spacing_ms: u64,
    #[serde(default = "default_status_capacity")]
    pub status_capacity: usize,
}

fn default_output_directory() -> String {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_track_spacing_ms() -> u64 {
    100
}

fn default_status_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub api_base: String,
    pub app_id: String,
    pub app_secret: SecretSource,
    /// Comma or newline separated pool of user auth tokens.
    pub auth_tokens: SecretSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub codec: OutputCodec,
    /// Target bitrate in kbps for lossy re-encodes; `None` lets the encoder choose.
    #[serde(default = "default_bitrate")]
    pub bitrate: Option<u32>,
    #[serde(default = "default_true")]
    pub apply_metadata: bool,
}

fn default_bitrate() -> Option<u32> {
    Some(320)
}

fn default_true() -> bool {
    true
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            codec: OutputCodec::default(),
            bitrate: default_bitrate(),
            apply_metadata: true,
        }
    }
}
