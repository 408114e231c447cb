use serde::{Deserialize, Serialize};

/// Stream quality requested from the catalog, keyed by its `format_id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// 24-bit up to 192 kHz FLAC.
    #[default]
    #[serde(rename = "27")]
    HiRes192,
    /// 24-bit up to 96 kHz FLAC.
    #[serde(rename = "7")]
    HiRes96,
    /// 16-bit / 44.1 kHz FLAC.
    #[serde(rename = "6")]
    Cd,
    /// MP3 at 320 kbps.
    #[serde(rename = "5")]
    Mp3,
}

impl Quality {
    pub fn format_id(&self) -> &'static str {
        match self {
            Quality::HiRes192 => "27",
            Quality::HiRes96 => "7",
            Quality::Cd => "6",
            Quality::Mp3 => "5",
        }
    }

    pub fn from_format_id(id: &str) -> Option<Self> {
        match id {
            "27" => Some(Quality::HiRes192),
            "7" => Some(Quality::HiRes96),
            "6" => Some(Quality::Cd),
            "5" => Some(Quality::Mp3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.format_id())
    }
}

/// Descriptive fields written into the output file's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub version: Option<String>,
    /// Album-level artists; empty for compilations that only credit a performer.
    pub artists: Vec<String>,
    pub performer: Option<String>,
    pub album: String,
    pub album_version: Option<String>,
    pub genre: Option<String>,
    /// Original release date, `YYYY-MM-DD`.
    pub release_date: Option<String>,
    pub track_number: Option<u32>,
    pub isrc: Option<String>,
}

impl TrackMetadata {
    /// Title with the version appended in parentheses, e.g. `Song (Live)`.
    pub fn display_title(&self) -> String {
        format_title(&self.title, self.version.as_deref())
    }

    pub fn display_album(&self) -> String {
        format_title(&self.album, self.album_version.as_deref())
    }

    pub fn display_artists(&self) -> String {
        format_artists(&self.artists, self.performer.as_deref())
    }

    /// First credited artist, used for `album_artist`.
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(String::as_str)
            .or(self.performer.as_deref())
            .unwrap_or(VARIOUS_ARTISTS)
    }

    pub fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

/// A single resolvable, fetchable audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAsset {
    pub source_id: u64,
    /// Non-streamable tracks are skipped without error.
    pub streamable: bool,
    pub disk_number: u32,
    pub track_number: u32,
    pub duration_secs: u32,
    /// Filled in by the size probe; never assumed.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Full-resolution cover for the track's album, if the catalog has one.
    pub cover_url: Option<String>,
    pub metadata: TrackMetadata,
}

impl TrackAsset {
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.metadata.display_artists(),
            self.metadata.display_title()
        )
    }
}

/// An album's full set of assets plus shared metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumBundle {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub artists: Vec<String>,
    pub upc: Option<String>,
    pub duration_secs: u32,
    pub track_count: u32,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub cover_url: Option<String>,
    pub tracks: Vec<TrackAsset>,
}

impl AlbumBundle {
    pub fn display_title(&self) -> String {
        format_title(&self.title, self.version.as_deref())
    }

    pub fn display_artists(&self) -> String {
        format_artists(&self.artists, None)
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.display_artists(), self.display_title())
    }
}

pub const VARIOUS_ARTISTS: &str = "Various Artists";

pub fn format_title(title: &str, version: Option<&str>) -> String {
    match version.filter(|v| !v.is_empty()) {
        Some(v) => format!("{} ({})", title, v).trim().to_string(),
        None => title.trim().to_string(),
    }
}

pub fn format_artists(artists: &[String], performer: Option<&str>) -> String {
    if !artists.is_empty() {
        return artists.join(", ");
    }
    performer.unwrap_or(VARIOUS_ARTISTS).to_string()
}

/// Turns the catalog's 600px cover URL (`..._600.jpg`) into the original-size one (`..._org.jpg`).
pub fn full_res_cover_url(large: &str) -> Option<String> {
    let cut = large.len().checked_sub("600.jpg".len())?;
    let base = large.get(..cut)?;
    Some(format!("{}org.jpg", base))
}
