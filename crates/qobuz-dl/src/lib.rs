pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod packager;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod transcode;
pub mod transfer;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent, StatusPublisher, StatusSnapshot};
pub use catalog::{AlbumBundle, Catalog, Quality, QobuzCatalog, TrackAsset, TrackMetadata};
pub use config::{load_config, Config};
pub use error::{
    CatalogError, ConfigError, DeliveryError, PackagingError, QobuzDlError, QueueError, Result,
    TranscodeError, TransferError,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError};
pub use secrets::{resolve_secret, SecretError, SecretSource};
pub use transcode::OutputCodec;
pub use worker::{JobQueue, JobTarget};
