use serde::{Deserialize, Serialize};

use crate::catalog::Quality;

/// Output formats the transcoder can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputCodec {
    #[default]
    Flac,
    Wav,
    Alac,
    Mp3,
    Aac,
    Opus,
}

impl OutputCodec {
    /// Container file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputCodec::Flac => "flac",
            OutputCodec::Wav => "wav",
            OutputCodec::Alac | OutputCodec::Aac => "m4a",
            OutputCodec::Mp3 => "mp3",
            OutputCodec::Opus => "ogg",
        }
    }

    /// Encoder name handed to the codec engine.
    pub fn encoder(&self) -> &'static str {
        match self {
            OutputCodec::Flac => "flac",
            OutputCodec::Wav => "pcm_s16le",
            OutputCodec::Alac => "alac",
            OutputCodec::Mp3 => "libmp3lame",
            OutputCodec::Aac => "aac",
            OutputCodec::Opus => "libopus",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputCodec::Flac => "FLAC",
            OutputCodec::Wav => "WAV",
            OutputCodec::Alac => "ALAC",
            OutputCodec::Mp3 => "MP3",
            OutputCodec::Aac => "AAC",
            OutputCodec::Opus => "OPUS",
        }
    }

    /// Raw PCM containers cannot hold tags.
    pub fn supports_tags(&self) -> bool {
        !matches!(self, OutputCodec::Wav)
    }

    pub fn supports_cover_art(&self) -> bool {
        !matches!(self, OutputCodec::Wav | OutputCodec::Opus)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FLAC" => Some(OutputCodec::Flac),
            "WAV" => Some(OutputCodec::Wav),
            "ALAC" => Some(OutputCodec::Alac),
            "MP3" => Some(OutputCodec::Mp3),
            "AAC" => Some(OutputCodec::Aac),
            "OPUS" => Some(OutputCodec::Opus),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Format of the byte stream the catalog serves for a given quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Flac,
    Mp3 { bitrate: u32 },
}

impl SourceFormat {
    pub fn for_quality(quality: Quality) -> Self {
        match quality {
            Quality::Mp3 => SourceFormat::Mp3 { bitrate: 320 },
            Quality::HiRes192 | Quality::HiRes96 | Quality::Cd => SourceFormat::Flac,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Flac => "flac",
            SourceFormat::Mp3 { .. } => "mp3",
        }
    }

    /// True when the stream already is what was asked for, so re-encoding
    /// would only cost fidelity. Lossless FLAC ignores the bitrate; MP3 must
    /// match the requested bitrate exactly.
    pub fn matches(&self, codec: OutputCodec, bitrate: Option<u32>) -> bool {
        match self {
            SourceFormat::Flac => codec == OutputCodec::Flac,
            SourceFormat::Mp3 { bitrate: source } => {
                codec == OutputCodec::Mp3 && bitrate == Some(*source)
            }
        }
    }
}
