use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result, TransferOp};
use crate::persistence::join_segments;
use crate::registry::PersistenceRegistry;
use crate::scheme::Scheme;

/// Moves data between the local sandbox and whatever store a path names.
///
/// Owns the sandbox directory (created here, never removed here) and the raw
/// output prefix under which generated upload locations live. Driver errors
/// are passed through untouched, wrapped in [`Error::Transfer`] so the failing
/// operation and both paths show up in diagnostics. Nothing is retried.
pub struct FileAccessProvider {
    registry: Arc<PersistenceRegistry>,
    local_sandbox_dir: PathBuf,
    raw_output_prefix: String,
}

impl FileAccessProvider {
    pub fn new(
        registry: Arc<PersistenceRegistry>,
        local_sandbox_dir: impl AsRef<Path>,
        raw_output_prefix: impl Into<String>,
    ) -> Result<Self> {
        let local_sandbox_dir = local_sandbox_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&local_sandbox_dir)?;
        Ok(Self {
            registry,
            local_sandbox_dir,
            raw_output_prefix: raw_output_prefix.into(),
        })
    }

    pub fn registry(&self) -> &Arc<PersistenceRegistry> {
        &self.registry
    }

    pub fn local_sandbox_dir(&self) -> &Path {
        &self.local_sandbox_dir
    }

    pub fn raw_output_prefix(&self) -> &str {
        &self.raw_output_prefix
    }

    pub fn is_remote(path: &str) -> bool {
        Scheme::parse(path).is_remote()
    }

    fn random_name() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// A unique path inside the sandbox; nothing is created.
    pub fn get_random_local_path(&self, file_name: Option<&str>) -> PathBuf {
        let path = self.local_sandbox_dir.join(Self::random_name());
        match file_name {
            Some(name) => path.join(name),
            None => path,
        }
    }

    /// Creates and returns a fresh, empty directory inside the sandbox.
    pub fn get_random_local_directory(&self) -> Result<PathBuf> {
        let dir = self.get_random_local_path(None);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn get_random_remote_path(&self, file_name: Option<&str>) -> String {
        let random = Self::random_name();
        join_segments(
            [self.raw_output_prefix.as_str(), random.as_str()]
                .into_iter()
                .chain(file_name),
        )
    }

    pub fn get_random_remote_directory(&self) -> String {
        self.get_random_remote_path(None)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let driver = self.registry.resolve(path)?;
        driver
            .exists(path)
            .await
            .map_err(|e| tag(TransferOp::Exists, path, path, e))
    }

    pub async fn get(&self, remote_path: &str, local_path: &Path, recursive: bool) -> Result<()> {
        let driver = self.registry.resolve(remote_path)?;
        debug!(
            driver = driver.name(),
            from = remote_path,
            to = %local_path.display(),
            recursive,
            "Downloading"
        );
        driver
            .get(remote_path, local_path, recursive)
            .await
            .map_err(|e| tag(TransferOp::Get, remote_path, &local_path.display().to_string(), e))
    }

    /// Uploads `local_path`, to a generated location under the raw output
    /// prefix when `remote_path` is `None`. Returns the location written.
    pub async fn put(
        &self,
        local_path: &Path,
        remote_path: Option<&str>,
        recursive: bool,
    ) -> Result<String> {
        let remote_path = match remote_path {
            Some(path) => path.to_string(),
            None => self.get_random_remote_path(None),
        };
        let driver = self.registry.resolve(&remote_path)?;
        driver
            .put(local_path, &remote_path, recursive)
            .await
            .map_err(|e| tag(TransferOp::Put, &local_path.display().to_string(), &remote_path, e))?;
        info!(
            driver = driver.name(),
            from = %local_path.display(),
            to = %remote_path,
            recursive,
            "Uploaded"
        );
        Ok(remote_path)
    }

    pub async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        self.get(remote_path, local_path, false).await
    }

    pub async fn download_directory(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        self.get(remote_path, local_path, true).await
    }

    pub async fn upload(&self, local_path: &Path, remote_path: Option<&str>) -> Result<String> {
        self.put(local_path, remote_path, false).await
    }

    pub async fn upload_directory(
        &self,
        local_path: &Path,
        remote_path: Option<&str>,
    ) -> Result<String> {
        self.put(local_path, remote_path, true).await
    }
}

fn tag(op: TransferOp, from: &str, to: &str, source: Error) -> Error {
    Error::Transfer {
        op,
        from: from.to_string(),
        to: to.to_string(),
        source: Box::new(source),
    }
}
