//! Audio re-encoding and tagging behind a black-box codec engine.

pub mod codec;
pub mod ffmpeg;
pub mod metadata;

use async_trait::async_trait;

use crate::catalog::TrackMetadata;
use crate::error::TranscodeError;

pub use codec::{OutputCodec, SourceFormat};
pub use ffmpeg::FfmpegTranscoder;

/// Codec engine boundary. Implementations must be deterministic for
/// identical inputs and must not retain the input buffers.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Converts `input` from `source` into `codec`, optionally at `bitrate` kbps.
    async fn reencode(
        &self,
        input: &[u8],
        source: SourceFormat,
        codec: OutputCodec,
        bitrate: Option<u32>,
    ) -> Result<Vec<u8>, TranscodeError>;

    /// Embeds `tags` (and `cover`, where the container allows it) into a
    /// stream already encoded as `codec`.
    async fn tag(
        &self,
        input: &[u8],
        codec: OutputCodec,
        tags: &TrackMetadata,
        cover: Option<&[u8]>,
    ) -> Result<Vec<u8>, TranscodeError>;
}
