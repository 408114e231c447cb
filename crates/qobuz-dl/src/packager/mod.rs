//! Archive assembly for album jobs.

pub mod zip;

use async_trait::async_trait;

use crate::error::PackagingError;
use crate::sanitize::clean_file_name;

pub use self::zip::ZipPackager;

/// Name of the shared artwork entry inside an album archive.
pub const COVER_ENTRY_NAME: &str = "cover.jpg";

/// One named file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Archive engine boundary. Entries are written in the order given.
#[async_trait]
pub trait Packager: Send + Sync {
    async fn pack(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, PackagingError>;
}

/// Width of the zero-padded sequence prefix: at least two digits, more when
/// the track count needs them.
pub fn prefix_width(track_count: usize) -> usize {
    track_count.to_string().len().max(2)
}

/// Entry name for an album track, e.g. `03 Blue in Green.flac`.
pub fn track_entry_name(slot: u32, width: usize, title: &str, extension: &str) -> String {
    clean_file_name(&format!(
        "{:0width$} {}.{}",
        slot,
        title,
        extension,
        width = width
    ))
}

/// Delivered file name for a finished album archive.
pub fn archive_file_name(label: &str) -> String {
    clean_file_name(&format!("{}.zip", label))
}
