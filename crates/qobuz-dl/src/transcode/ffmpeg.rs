use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::codec::{OutputCodec, SourceFormat};
use super::metadata::ffmetadata;
use super::Transcoder;
use crate::catalog::TrackMetadata;
use crate::error::TranscodeError;

/// Longest stderr excerpt kept in an engine error.
const MAX_STDERR_LENGTH: usize = 2000;

/// Drives an `ffmpeg` executable through scratch files in a private temp dir.
///
/// Child processes are spawned with `kill_on_drop`, so dropping a pending
/// future (e.g. on cancellation) terminates the engine.
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn scratch() -> Result<TempDir, TranscodeError> {
        tempfile::Builder::new()
            .prefix("qobuz-dl-")
            .tempdir()
            .map_err(TranscodeError::Scratch)
    }

    async fn write(path: &Path, bytes: &[u8]) -> Result<(), TranscodeError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(TranscodeError::Scratch)
    }

    async fn read(path: &Path) -> Result<Vec<u8>, TranscodeError> {
        tokio::fs::read(path).await.map_err(TranscodeError::Scratch)
    }

    async fn run(&self, step: &'static str, args: Vec<OsString>) -> Result<(), TranscodeError> {
        debug!(step, program = %self.program.display(), "Running codec engine");

        let output = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscodeError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let stderr = if stderr.len() > MAX_STDERR_LENGTH {
            let mut end = MAX_STDERR_LENGTH;
            while !stderr.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &stderr[..end])
        } else {
            stderr.to_string()
        };

        Err(TranscodeError::Engine {
            step,
            code: output.status.code(),
            stderr,
        })
    }
}

/// Arguments for a plain re-encode.
pub(crate) fn reencode_args(
    input: &Path,
    output: &Path,
    codec: OutputCodec,
    bitrate: Option<u32>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        input.into(),
        "-c:a".into(),
        codec.encoder().into(),
    ];
    if let Some(kbps) = bitrate {
        args.push("-b:a".into());
        args.push(format!("{}k", kbps).into());
    }
    args.push(output.into());
    args
}

/// Arguments that copy the streams and replace global tags from a metadata document.
pub(crate) fn metadata_args(input: &Path, metadata: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        input.into(),
        "-i".into(),
        metadata.into(),
        "-map_metadata".into(),
        "1".into(),
        "-codec".into(),
        "copy".into(),
        output.into(),
    ]
}

/// Arguments that attach a picture stream as cover art.
pub(crate) fn cover_args(input: &Path, cover: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        input.into(),
        "-i".into(),
        cover.into(),
        "-c".into(),
        "copy".into(),
        "-map".into(),
        "0".into(),
        "-map".into(),
        "1".into(),
        "-disposition:v:0".into(),
        "attached_pic".into(),
        output.into(),
    ]
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn reencode(
        &self,
        input: &[u8],
        source: SourceFormat,
        codec: OutputCodec,
        bitrate: Option<u32>,
    ) -> Result<Vec<u8>, TranscodeError> {
        let dir = Self::scratch()?;
        let input_path = dir.path().join(format!("input.{}", source.extension()));
        let output_path = dir.path().join(format!("output.{}", codec.extension()));

        Self::write(&input_path, input).await?;
        self.run(
            "reencode",
            reencode_args(&input_path, &output_path, codec, bitrate),
        )
        .await?;
        Self::read(&output_path).await
    }

    async fn tag(
        &self,
        input: &[u8],
        codec: OutputCodec,
        tags: &TrackMetadata,
        cover: Option<&[u8]>,
    ) -> Result<Vec<u8>, TranscodeError> {
        if !codec.supports_tags() {
            return Err(TranscodeError::TagsUnsupported(codec.name()));
        }

        let dir = Self::scratch()?;
        let ext = codec.extension();
        let input_path = dir.path().join(format!("input.{}", ext));
        let metadata_path = dir.path().join("metadata.txt");
        let tagged_path = dir.path().join(format!("tagged.{}", ext));

        Self::write(&input_path, input).await?;
        Self::write(&metadata_path, ffmetadata(tags).as_bytes()).await?;
        self.run(
            "metadata",
            metadata_args(&input_path, &metadata_path, &tagged_path),
        )
        .await?;

        let cover = match cover {
            Some(cover) if codec.supports_cover_art() => cover,
            _ => return Self::read(&tagged_path).await,
        };

        let cover_path = dir.path().join("cover.jpg");
        let output_path = dir.path().join(format!("output.{}", ext));
        Self::write(&cover_path, cover).await?;
        self.run(
            "cover_art",
            cover_args(&tagged_path, &cover_path, &output_path),
        )
        .await?;
        Self::read(&output_path).await
    }
}
