use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::DeliverySink;
use crate::error::DeliveryError;
use crate::sanitize::clean_file_name;

/// Highest numbered variant tried before giving up on a crowded name.
const MAX_CONFLICT_SUFFIX: u32 = 1000;

/// Removes a freshly created file on drop unless the write completed.
/// Covers both write errors and a delivery future dropped mid-write.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Writes artifacts into a local output directory.
pub struct FsDelivery {
    output_directory: PathBuf,
}

impl FsDelivery {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    async fn ensure_directory(&self) -> Result<(), DeliveryError> {
        tokio::fs::create_dir_all(&self.output_directory)
            .await
            .map_err(|e| DeliveryError::CreateDirectory {
                path: self.output_directory.clone(),
                source: e,
            })
    }

    /// Creates the file exclusively, moving on to `name_2.ext`, `name_3.ext`, ...
    /// when a name is taken. Never overwrites an existing file.
    async fn write_exclusive(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> Result<PathBuf, DeliveryError> {
        let (base, ext) = match file_name.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&file_name[..dot_pos], Some(&file_name[dot_pos..])),
            _ => (file_name, None),
        };

        for counter in 1..=MAX_CONFLICT_SUFFIX {
            let try_name = if counter == 1 {
                file_name.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let try_path = self.output_directory.join(&try_name);

            // Opened synchronously so a dropped future never strands an
            // empty file the guard does not know about.
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(file) => {
                    let partial = PartialFile::new(&try_path);
                    let mut file = tokio::fs::File::from_std(file);
                    let written = async {
                        file.write_all(content).await?;
                        file.flush().await
                    }
                    .await;
                    if let Err(e) = written {
                        return Err(DeliveryError::WriteFile {
                            path: try_path,
                            source: e,
                        });
                    }
                    partial.keep();
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DeliveryError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(DeliveryError::FileExists(self.output_directory.join(file_name)))
    }
}

#[async_trait]
impl DeliverySink for FsDelivery {
    async fn deliver(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf, DeliveryError> {
        self.ensure_directory().await?;
        let file_name = clean_file_name(file_name);
        let path = self.write_exclusive(&file_name, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Delivered artifact");
        Ok(path)
    }
}
