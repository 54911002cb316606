//! Filesystem-backed video cache.
//!
//! Videos live flat in one directory under their manifest filename. Saves
//! write to a hidden `.<filename>.part` file and rename it into place, so an
//! interrupted download (power loss, shutdown mid-sync) never leaves a
//! truncated video under a real name. Leftover part files are removed when
//! the cache is opened and are never reported by `list`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::probe::{self, PROBE_LEN};
use super::traits::{check_filename, CacheError, CacheResult, CacheUsage, CachedVideo, LocalCache};
use crate::http::BoxFuture;
use crate::manifest::LocalRef;

/// Suffix of in-progress writes.
const PART_SUFFIX: &str = ".part";

/// Video cache in a local directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    directory: PathBuf,
}

impl DiskCache {
    /// Opens (and creates if needed) a cache rooted at `directory`.
    ///
    /// Removes part files left behind by interrupted saves.
    pub async fn open(directory: impl Into<PathBuf>) -> CacheResult<Self> {
        let cache = Self {
            directory: directory.into(),
        };
        fs::create_dir_all(&cache.directory).await?;
        cache.remove_stale_parts().await?;
        Ok(cache)
    }

    /// Root directory of the cache.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.directory.join(filename)
    }

    fn part_path_for(&self, filename: &str) -> PathBuf {
        self.directory.join(format!(".{}{}", filename, PART_SUFFIX))
    }

    async fn remove_stale_parts(&self) -> CacheResult<()> {
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') && name.ends_with(PART_SUFFIX) {
                debug!(file = %name, "Removing interrupted cache write");
                if let Err(e) = fs::remove_file(entry.path()).await {
                    warn!(file = %name, error = %e, "Failed to remove part file");
                }
            }
        }
        Ok(())
    }

    async fn write_atomically(&self, filename: &str, data: &[u8]) -> CacheResult<PathBuf> {
        let part = self.part_path_for(filename);
        let target = self.path_for(filename);

        let result = async {
            let mut file = fs::File::create(&part).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&part, &target).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&part).await;
            return Err(CacheError::Io(e));
        }
        Ok(target)
    }
}

impl LocalCache for DiskCache {
    fn exists(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            match fs::metadata(self.path_for(&filename)).await {
                Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn save(&self, filename: &str, data: Bytes) -> BoxFuture<'_, CacheResult<LocalRef>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            fs::create_dir_all(&self.directory).await?;
            let path = self.write_atomically(&filename, &data).await?;
            debug!(filename = %filename, bytes = data.len(), "Saved video to disk cache");
            Ok(LocalRef::File(path))
        })
    }

    fn verify(&self, filename: &str) -> BoxFuture<'_, CacheResult<CachedVideo>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            let path = self.path_for(&filename);

            let mut file = match fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(CacheError::NotFound(filename))
                }
                Err(e) => return Err(CacheError::Io(e)),
            };
            let size_bytes = file.metadata().await?.len();
            if size_bytes == 0 {
                return Err(CacheError::VerificationFailed {
                    filename,
                    reason: "file is empty".to_string(),
                });
            }

            let mut header = Vec::with_capacity(PROBE_LEN);
            (&mut file)
                .take(PROBE_LEN as u64)
                .read_to_end(&mut header)
                .await?;

            match probe::detect(&header) {
                Some(container) => Ok(CachedVideo {
                    local_ref: LocalRef::File(path),
                    size_bytes,
                    container,
                }),
                None => Err(CacheError::VerificationFailed {
                    filename,
                    reason: "unrecognized container header".to_string(),
                }),
            }
        })
    }

    fn list(&self) -> BoxFuture<'_, CacheResult<Vec<String>>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut entries = match fs::read_dir(&self.directory).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
                Err(e) => return Err(CacheError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();
            Ok(names)
        })
    }

    fn remove(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>> {
        let filename = filename.to_string();
        Box::pin(async move {
            check_filename(&filename)?;
            match fs::remove_file(self.path_for(&filename)).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn usage(&self) -> BoxFuture<'_, CacheResult<CacheUsage>> {
        Box::pin(async move {
            let mut usage = CacheUsage::default();
            for name in self.list().await? {
                if let Ok(meta) = fs::metadata(self.path_for(&name)).await {
                    usage.files += 1;
                    usage.bytes += meta.len();
                }
            }
            Ok(usage)
        })
    }

    fn name(&self) -> &str {
        "disk"
    }
}
