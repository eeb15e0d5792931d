//! File persistence used by the output writer, the link resolver and media commit.

use std::path::{Path, PathBuf};

use dashmap::{DashMap, DashSet};
use motionlink_common::MotionlinkError;
use tokio::fs;

pub trait FilePersistence: Send + Sync {
    fn read_text(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<String, MotionlinkError>> + Send;

    /// Write `content`, creating parent directories as needed.
    fn write_text(
        &self,
        path: &Path,
        content: &str,
    ) -> impl Future<Output = Result<(), MotionlinkError>> + Send;

    fn write_bytes(
        &self,
        path: &Path,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), MotionlinkError>> + Send;

    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn mkdir_all(&self, path: &Path) -> impl Future<Output = Result<(), MotionlinkError>> + Send;
}

impl<T: FilePersistence> FilePersistence for &T {
    fn read_text(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<String, MotionlinkError>> + Send {
        (**self).read_text(path)
    }

    fn write_text(
        &self,
        path: &Path,
        content: &str,
    ) -> impl Future<Output = Result<(), MotionlinkError>> + Send {
        (**self).write_text(path, content)
    }

    fn write_bytes(
        &self,
        path: &Path,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), MotionlinkError>> + Send {
        (**self).write_bytes(path, bytes)
    }

    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send {
        (**self).exists(path)
    }

    fn mkdir_all(&self, path: &Path) -> impl Future<Output = Result<(), MotionlinkError>> + Send {
        (**self).mkdir_all(path)
    }
}

/// The local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    async fn ensure_parent(&self, path: &Path) -> Result<(), MotionlinkError> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.mkdir_all(parent).await,
            _ => Ok(()),
        }
    }
}

impl FilePersistence for LocalFs {
    async fn read_text(&self, path: &Path) -> Result<String, MotionlinkError> {
        fs::read_to_string(path)
            .await
            .map_err(|e| MotionlinkError::io(path, e))
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<(), MotionlinkError> {
        self.write_bytes(path, content.as_bytes()).await
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), MotionlinkError> {
        self.ensure_parent(path).await?;
        fs::write(path, bytes)
            .await
            .map_err(|e| MotionlinkError::io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn mkdir_all(&self, path: &Path) -> Result<(), MotionlinkError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| MotionlinkError::io(path, e))
    }
}

/// In-memory file system. Writes are recorded in order.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: DashMap<PathBuf, Vec<u8>>,
    dirs: DashSet<PathBuf>,
    writes: DashMap<PathBuf, usize>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, e.g. a template.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn bytes(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.get(path.as_ref()).map(|bytes| bytes.clone())
    }

    /// All paths written through this file system, sorted.
    pub fn written(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.writes.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// How many times `path` was written.
    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        self.writes.get(path.as_ref()).map_or(0, |count| *count)
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.dirs.contains(path.as_ref())
    }
}

impl FilePersistence for MemoryFs {
    async fn read_text(&self, path: &Path) -> Result<String, MotionlinkError> {
        self.text(path).ok_or_else(|| {
            MotionlinkError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<(), MotionlinkError> {
        self.write_bytes(path, content.as_bytes()).await
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), MotionlinkError> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        *self.writes.entry(path.to_path_buf()).or_insert(0) += 1;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    async fn mkdir_all(&self, path: &Path) -> Result<(), MotionlinkError> {
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                self.dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }
}
