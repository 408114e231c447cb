use std::collections::HashSet;
use std::io::{Cursor, Write};

use async_trait::async_trait;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{ArchiveEntry, Packager};
use crate::error::PackagingError;

/// Stored (uncompressed) zip archives. Audio is already compressed, and
/// fixed entry timestamps keep the output identical for identical inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPackager;

impl ZipPackager {
    pub fn new() -> Self {
        Self
    }

    fn pack_blocking(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, PackagingError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .large_file(entries.iter().any(|e| e.bytes.len() as u64 >= u32::MAX as u64));

        let capacity = entries.iter().map(|e| e.bytes.len()).sum();
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(capacity)));
        let mut seen = HashSet::new();

        // Consume entries one by one so each buffer is freed once written.
        for entry in entries {
            if !seen.insert(entry.name.clone()) {
                return Err(PackagingError::DuplicateEntry(entry.name));
            }
            writer.start_file(entry.name.as_str(), options)?;
            writer
                .write_all(&entry.bytes)
                .map_err(|e| PackagingError::Entry {
                    entry: entry.name.clone(),
                    source: e,
                })?;
        }

        let archive = writer.finish()?.into_inner();
        debug!(entries = seen.len(), bytes = archive.len(), "Packed archive");
        Ok(archive)
    }
}

#[async_trait]
impl Packager for ZipPackager {
    async fn pack(&self, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, PackagingError> {
        tokio::task::spawn_blocking(move || Self::pack_blocking(entries))
            .await
            .map_err(|e| PackagingError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entries() -> Vec<ArchiveEntry> {
        vec![
            ArchiveEntry::new("01 First.flac", b"first-track".to_vec()),
            ArchiveEntry::new("02 Second.flac", b"second-track".to_vec()),
            ArchiveEntry::new("cover.jpg", vec![0xFF, 0xD8, 0xFF]),
        ]
    }

    #[tokio::test]
    async fn test_pack_preserves_order_and_contents() {
        let archive = ZipPackager::new().pack(entries()).await.unwrap();

        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 3);

        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["01 First.flac", "02 Second.flac", "cover.jpg"]);

        let mut contents = Vec::new();
        zip.by_name("02 Second.flac")
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, b"second-track");

        let cover = zip.by_name("cover.jpg").unwrap();
        assert_eq!(cover.compression(), CompressionMethod::Stored);
    }

    #[tokio::test]
    async fn test_pack_is_deterministic() {
        let packager = ZipPackager::new();
        let first = packager.pack(entries()).await.unwrap();
        let second = packager.pack(entries()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let result = ZipPackager::new()
            .pack(vec![
                ArchiveEntry::new("01 Same.flac", vec![1]),
                ArchiveEntry::new("01 Same.flac", vec![2]),
            ])
            .await;
        assert!(
            matches!(result, Err(PackagingError::DuplicateEntry(name)) if name == "01 Same.flac")
        );
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let archive = ZipPackager::new().pack(Vec::new()).await.unwrap();
        let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 0);
    }
}
