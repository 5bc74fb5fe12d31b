//! Handles to files and directories that may not be on local disk yet.
//!
//! An [`Artifact`] names a path and, when it was produced from a remote blob,
//! carries a downloader that fills a local staging location on first access.
//! The shape (single file or directory) is a type parameter, so a directory
//! handle can never be emitted as a single-object blob or the other way around.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::Result;
use crate::literal::BlobDimensionality;
use crate::scheme::{Scheme, split_protocol};

pub type Downloader = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Directory {}
    impl Sealed for super::File {}
}

/// Static shape of an artifact.
pub trait Shape: sealed::Sealed + Send + Sync + 'static {
    const DIMENSIONALITY: BlobDimensionality;
    const KIND: &'static str;

    fn matches(metadata: &std::fs::Metadata) -> bool;
}

/// Marker for directory artifacts (multipart blobs).
#[derive(Debug)]
pub enum Directory {}

/// Marker for single-file artifacts.
#[derive(Debug)]
pub enum File {}

impl Shape for Directory {
    const DIMENSIONALITY: BlobDimensionality = BlobDimensionality::Multipart;
    const KIND: &'static str = "directory";

    fn matches(metadata: &std::fs::Metadata) -> bool {
        metadata.is_dir()
    }
}

impl Shape for File {
    const DIMENSIONALITY: BlobDimensionality = BlobDimensionality::Single;
    const KIND: &'static str = "file";

    fn matches(metadata: &std::fs::Metadata) -> bool {
        metadata.is_file()
    }
}

pub type ArtifactDir = Artifact<Directory>;
pub type ArtifactFile = Artifact<File>;

pub struct Artifact<S: Shape> {
    path: String,
    local_path: Option<PathBuf>,
    downloader: Option<Downloader>,
    downloaded: AtomicBool,
    // Held for the whole download so concurrent first accesses run it once.
    gate: tokio::sync::Mutex<()>,
    _shape: PhantomData<fn() -> S>,
}

impl<S: Shape> Artifact<S> {
    /// A handle to something that needs no download: a local path, or a
    /// remote reference that is only ever passed along.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            local_path: None,
            downloader: None,
            downloaded: AtomicBool::new(false),
            gate: tokio::sync::Mutex::new(()),
            _shape: PhantomData,
        }
    }

    /// A handle whose content reaches `local_path` only when `downloader` runs.
    pub fn lazy<F, Fut>(
        path: impl Into<String>,
        local_path: impl Into<PathBuf>,
        downloader: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let downloader: Downloader = Arc::new(move || downloader().boxed());
        Self {
            local_path: Some(local_path.into()),
            downloader: Some(downloader),
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dimensionality(&self) -> BlobDimensionality {
        S::DIMENSIONALITY
    }

    /// The remote URI this handle stands for, if its path has a remote scheme.
    pub fn remote_source(&self) -> Option<&str> {
        Scheme::parse(&self.path)
            .is_remote()
            .then_some(self.path.as_str())
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloader.is_none() || self.downloaded.load(Ordering::Acquire)
    }

    /// Runs the downloader if it has not completed yet.
    ///
    /// The first caller downloads while any concurrent callers wait for it.
    /// A failed download leaves the handle undownloaded, so the next call
    /// tries again.
    pub async fn materialize(&self) -> Result<()> {
        let Some(downloader) = &self.downloader else {
            return Ok(());
        };
        if self.downloaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.gate.lock().await;
        if self.downloaded.load(Ordering::Acquire) {
            return Ok(());
        }
        debug!(path = %self.path, kind = S::KIND, "Materializing artifact");
        downloader().await?;
        self.downloaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Local filesystem path of the content, downloading it first if needed.
    pub async fn local_path(&self) -> Result<&Path> {
        self.materialize().await?;
        Ok(match &self.local_path {
            Some(staged) => staged.as_path(),
            None => match split_protocol(&self.path) {
                (Some("file"), rest) => Path::new(rest),
                _ => Path::new(&self.path),
            },
        })
    }
}

impl<S: Shape> From<&str> for Artifact<S> {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl<S: Shape> PartialEq for Artifact<S> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<S: Shape> Eq for Artifact<S> {}

impl<S: Shape> Hash for Artifact<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl<S: Shape> fmt::Debug for Artifact<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &S::KIND)
            .field("path", &self.path)
            .field("local_path", &self.local_path)
            .field("downloaded", &self.is_downloaded())
            .finish()
    }
}
