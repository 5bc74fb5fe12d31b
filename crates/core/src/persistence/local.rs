use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{DataPersistence, collect_files, join_segments};
use crate::error::{Error, Result};
use crate::scheme::split_protocol;

const PROTOCOL: &str = "file";

/// Driver for `file://` URIs and scheme-less absolute paths.
#[derive(Debug, Clone, Default)]
pub struct LocalPersistence {
    default_prefix: Option<String>,
}

impl LocalPersistence {
    pub const NAME: &'static str = "local";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_prefix(prefix: impl Into<String>) -> Self {
        Self {
            default_prefix: Some(prefix.into()),
        }
    }

    fn full_path(path: &str) -> PathBuf {
        match split_protocol(path) {
            (Some(PROTOCOL), rest) => PathBuf::from(rest),
            _ => PathBuf::from(path),
        }
    }
}

/// Copies a single file, creating `to`'s parent directories.
pub(crate) async fn copy_file(from: &Path, to: &Path) -> std::io::Result<u64> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await
}

/// Copies the contents of `from` into `to`; returns the number of files copied.
pub(crate) async fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    // Listed before the first write so a destination nested in `from` is not re-copied.
    let files = collect_files(from).await?;
    tokio::fs::create_dir_all(to).await?;
    for (source, relative) in &files {
        copy_file(source, &to.join(relative)).await?;
    }
    Ok(files.len())
}

#[async_trait]
impl DataPersistence for LocalPersistence {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = Self::full_path(path);
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| Error::access(path, e))
    }

    async fn get(&self, from: &str, to: &Path, recursive: bool) -> Result<()> {
        let source = Self::full_path(from);
        debug!(from = %source.display(), to = %to.display(), recursive, "local get");
        if recursive {
            copy_tree(&source, to)
                .await
                .map_err(|e| Error::access(from, e))?;
        } else {
            copy_file(&source, to)
                .await
                .map_err(|e| Error::access(from, e))?;
        }
        Ok(())
    }

    async fn put(&self, from: &Path, to: &str, recursive: bool) -> Result<()> {
        let target = Self::full_path(to);
        debug!(from = %from.display(), to = %target.display(), recursive, "local put");
        if recursive {
            copy_tree(from, &target)
                .await
                .map_err(|e| Error::access(to, e))?;
        } else {
            copy_file(from, &target)
                .await
                .map_err(|e| Error::access(to, e))?;
        }
        Ok(())
    }

    fn construct_path(
        &self,
        add_protocol: bool,
        add_prefix: bool,
        segments: &[&str],
    ) -> Result<String> {
        let prefix = self.default_prefix.as_deref().filter(|_| add_prefix);
        let path = join_segments(prefix.into_iter().chain(segments.iter().copied()));
        if add_protocol {
            Ok(format!("{PROTOCOL}://{path}"))
        } else {
            Ok(path)
        }
    }
}
