use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tokio::fs;

use super::{ClientError, ClientResult, ContentStore};

fn io_error(path: &Path, err: io::Error) -> ClientError {
    match err.kind() {
        io::ErrorKind::NotFound => ClientError::NotFound(path.display().to_string()),
        io::ErrorKind::AlreadyExists => ClientError::AlreadyExists(path.display().to_string()),
        _ => ClientError::backend("filesystem", format!("{}: {}", path.display(), err)),
    }
}

/// Tenant content on a locally mounted shared filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalContentStore;

impl LocalContentStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn create_dir(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| io_error(parent, e))?;
        }
        fs::create_dir(path).await.map_err(|e| io_error(path, e))
    }

    async fn copy_tree(&self, from: &Path, to: &Path) -> ClientResult<()> {
        // Iterative walk keeps the future non-recursive.
        let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await.map_err(|e| io_error(&dst, e))?;
            let mut entries = fs::read_dir(&src).await.map_err(|e| io_error(&src, e))?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&src, e))? {
                let kind = entry.file_type().await.map_err(|e| io_error(&entry.path(), e))?;
                let target = dst.join(entry.file_name());
                if kind.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    fs::copy(entry.path(), &target)
                        .await
                        .map_err(|e| io_error(&target, e))?;
                }
            }
        }
        Ok(())
    }

    async fn extract_archive(&self, archive: &Path, into: &Path) -> ClientResult<()> {
        let archive = archive.to_path_buf();
        let into = into.to_path_buf();

        tokio::task::spawn_blocking(move || -> ClientResult<()> {
            std::fs::create_dir_all(&into).map_err(|e| io_error(&into, e))?;
            let file = std::fs::File::open(&archive).map_err(|e| io_error(&archive, e))?;
            let mut tar = tar::Archive::new(GzDecoder::new(file));
            tar.unpack(&into).map_err(|e| io_error(&archive, e))
        })
        .await
        .map_err(|e| ClientError::backend("filesystem", e))?
    }

    async fn remove_tree(&self, path: &Path) -> ClientResult<()> {
        fs::remove_dir_all(path).await.map_err(|e| io_error(path, e))
    }

    async fn read_to_string(&self, path: &Path) -> ClientResult<String> {
        fs::read_to_string(path).await.map_err(|e| io_error(path, e))
    }
}
