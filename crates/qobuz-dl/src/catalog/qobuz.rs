//! Catalog client for the Qobuz JSON API.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::model::{full_res_cover_url, AlbumBundle, Quality, TrackAsset, TrackMetadata};
use super::Catalog;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, QobuzDlError};

/// Maximum length for error bodies kept in errors, so tokens echoed back never flood logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

/// `request_sig` for `track/getFileUrl`.
pub fn request_signature(track_id: u64, quality: Quality, timestamp: i64, secret: &str) -> String {
    let raw = format!(
        "trackgetFileUrlformat_id{}intentstreamtrack_id{}{}{}",
        quality.format_id(),
        track_id,
        timestamp,
        secret
    );
    format!("{:x}", md5::compute(raw.as_bytes()))
}

pub struct QobuzCatalog {
    client: Client,
    api_base: String,
    app_id: String,
    app_secret: SecretString,
    auth_tokens: Vec<SecretString>,
    next_token: AtomicUsize,
}

impl QobuzCatalog {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: SecretString,
        auth_tokens: Vec<SecretString>,
    ) -> Result<Self, CatalogError> {
        if auth_tokens.is_empty() {
            return Err(CatalogError::NoAuthTokens);
        }
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Ok(Self {
            client,
            api_base,
            app_id: app_id.into(),
            app_secret,
            auth_tokens,
            next_token: AtomicUsize::new(0),
        })
    }

    /// Builds a client from config, resolving the app secret and token pool.
    pub fn from_config(client: Client, config: &CatalogConfig) -> Result<Self, QobuzDlError> {
        let secret = config.app_secret.resolve("catalog app secret")?;
        let tokens = config.auth_tokens.resolve_list("catalog auth tokens")?;
        Ok(Self::new(
            client,
            config.api_base.clone(),
            config.app_id.clone(),
            secret,
            tokens,
        )?)
    }

    /// Round-robins across the token pool.
    fn auth_token(&self) -> &SecretString {
        let i = self.next_token.fetch_add(1, Ordering::Relaxed);
        &self.auth_tokens[i % self.auth_tokens.len()]
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        debug!(endpoint, "catalog request");
        let response = self
            .client
            .get(format!("{}{}", self.api_base, endpoint))
            .query(query)
            .header("x-app-id", &self.app_id)
            .header("x-user-auth-token", self.auth_token().expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl Catalog for QobuzCatalog {
    async fn resolve_track(&self, track_id: u64) -> Result<TrackAsset, CatalogError> {
        let track: WireTrack = self
            .get_json("track/get", &[("track_id", track_id.to_string())])
            .await?;
        let album = track.album.clone().ok_or_else(|| CatalogError::MissingField {
            endpoint: "track/get".to_string(),
            field: "album".to_string(),
        })?;
        Ok(track.into_asset(&album))
    }

    async fn resolve_album(&self, album_id: &str) -> Result<AlbumBundle, CatalogError> {
        let album: WireAlbum = self
            .get_json(
                "album/get",
                &[
                    ("album_id", album_id.to_string()),
                    ("extra", "track_ids".to_string()),
                ],
            )
            .await?;
        Ok(album.into_bundle())
    }

    async fn resolve_stream_location(
        &self,
        track_id: u64,
        quality: Quality,
    ) -> Result<String, CatalogError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = request_signature(
            track_id,
            quality,
            timestamp,
            self.app_secret.expose_secret(),
        );
        let file: WireFileUrl = self
            .get_json(
                "track/getFileUrl",
                &[
                    ("format_id", quality.format_id().to_string()),
                    ("intent", "stream".to_string()),
                    ("track_id", track_id.to_string()),
                    ("request_ts", timestamp.to_string()),
                    ("request_sig", signature),
                ],
            )
            .await?;
        file.url.ok_or_else(|| CatalogError::MissingField {
            endpoint: "track/getFileUrl".to_string(),
            field: "url".to_string(),
        })
    }
}

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireFileUrl {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireName {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WireImage {
    large: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireTrackList {
    #[serde(default)]
    items: Vec<WireTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireTrack {
    id: u64,
    title: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    track_number: u32,
    #[serde(default = "default_media_number")]
    media_number: u32,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    isrc: Option<String>,
    #[serde(default)]
    performer: Option<WireName>,
    #[serde(default = "default_true")]
    streamable: bool,
    #[serde(default)]
    album: Option<WireAlbum>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireAlbum {
    id: String,
    title: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    artists: Vec<WireName>,
    #[serde(default)]
    artist: Option<WireName>,
    #[serde(default)]
    upc: Option<String>,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    tracks_count: u32,
    #[serde(default)]
    genre: Option<WireName>,
    #[serde(default)]
    release_date_original: Option<String>,
    #[serde(default)]
    image: Option<WireImage>,
    #[serde(default)]
    tracks: Option<WireTrackList>,
}

fn default_media_number() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl WireAlbum {
    fn artist_names(&self) -> Vec<String> {
        if !self.artists.is_empty() {
            return self.artists.iter().map(|a| a.name.clone()).collect();
        }
        self.artist.iter().map(|a| a.name.clone()).collect()
    }

    fn cover_url(&self) -> Option<String> {
        self.image
            .as_ref()
            .and_then(|i| i.large.as_deref())
            .and_then(full_res_cover_url)
    }

    pub(crate) fn into_bundle(self) -> AlbumBundle {
        let tracks = self
            .tracks
            .as_ref()
            .map(|list| list.items.iter().map(|t| t.into_asset(&self)).collect())
            .unwrap_or_default();
        AlbumBundle {
            artists: self.artist_names(),
            cover_url: self.cover_url(),
            genre: self.genre.as_ref().map(|g| g.name.clone()),
            id: self.id,
            title: self.title,
            version: self.version,
            upc: self.upc,
            duration_secs: self.duration,
            track_count: self.tracks_count,
            release_date: self.release_date_original,
            tracks,
        }
    }
}

impl WireTrack {
    pub(crate) fn into_asset(&self, album: &WireAlbum) -> TrackAsset {
        TrackAsset {
            source_id: self.id,
            streamable: self.streamable,
            disk_number: self.media_number,
            track_number: self.track_number,
            duration_secs: self.duration,
            size_bytes: None,
            cover_url: album.cover_url(),
            metadata: TrackMetadata {
                title: self.title.clone(),
                version: self.version.clone(),
                artists: album.artist_names(),
                performer: self.performer.as_ref().map(|p| p.name.clone()),
                album: album.title.clone(),
                album_version: album.version.clone(),
                genre: album.genre.as_ref().map(|g| g.name.clone()),
                release_date: album.release_date_original.clone(),
                track_number: (self.track_number > 0).then_some(self.track_number),
                isrc: self.isrc.clone(),
            },
        }
    }
}
