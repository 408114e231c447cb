use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QobuzDlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid bitrate {bitrate} kbps: must be between {min} and {max}")]
    InvalidBitrate { bitrate: u32, min: u32, max: u32 },
}

/// Catalog lookups and stream-location signing.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Catalog response for {endpoint} is missing '{field}'")]
    MissingField { endpoint: String, field: String },

    #[error("No auth tokens configured")]
    NoAuthTokens,

    #[error("Track {0} is not streamable")]
    NotStreamable(u64),

    #[error("Album {0} has no streamable tracks")]
    NoStreamableTracks(String),
}

/// Network failures while probing or fetching a byte stream.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transfer of {url} was interrupted after {received} bytes: {source}")]
    Interrupted {
        url: String,
        received: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Transfer of {url} was cancelled")]
    Cancelled { url: String },
}

/// Failures reported by the external codec engine.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to prepare scratch space: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} exited with {code:?}: {stderr}")]
    Engine {
        step: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Codec {0} cannot carry tags")]
    TagsUnsupported(&'static str),
}

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Archive write failed for entry '{entry}': {source}")]
    Entry {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive engine error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Packaging task panicked: {0}")]
    Join(String),

    #[error("Duplicate archive entry '{0}'")]
    DuplicateEntry(String),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job {0} is not queued or running")]
    UnknownJob(String),
}

pub type Result<T> = std::result::Result<T, QobuzDlError>;
