use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::artifact::{Artifact, Directory, File, Shape};
use crate::error::{Error, Result};
use crate::file_access::FileAccessProvider;
use crate::literal::{BlobDimensionality, BlobLiteral, BlobType};

/// How the caller is going to use the literals it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Literals feed a running task; local content may be downloaded and uploaded.
    #[default]
    TaskExecution,
    /// Only a call graph is being built; pending downloads are never triggered.
    Dispatch,
}

#[derive(Clone)]
pub struct ConversionContext {
    file_access: Arc<FileAccessProvider>,
    mode: ExecutionMode,
}

impl ConversionContext {
    pub fn new(file_access: Arc<FileAccessProvider>) -> Self {
        Self {
            file_access,
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(self, mode: ExecutionMode) -> Self {
        Self { mode, ..self }
    }

    pub fn file_access(&self) -> &Arc<FileAccessProvider> {
        &self.file_access
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Converts artifacts of shape `S` to and from [`BlobLiteral`]s.
pub struct BlobTransformer<S: Shape> {
    format: String,
    _shape: PhantomData<fn() -> S>,
}

pub type DirTransformer = BlobTransformer<Directory>;
pub type FileTransformer = BlobTransformer<File>;

impl<S: Shape> Default for BlobTransformer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Shape> BlobTransformer<S> {
    pub fn new() -> Self {
        Self {
            format: String::new(),
            _shape: PhantomData,
        }
    }

    /// Declares a format tag (e.g. `"csv"`) carried into every literal.
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            _shape: PhantomData,
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn get_literal_type(&self) -> BlobType {
        BlobType {
            format: self.format.clone(),
            dimensionality: S::DIMENSIONALITY,
        }
    }

    /// Remote artifacts pass through untouched. Local ones must exist with
    /// shape `S` and are uploaded to a fresh location under the raw output prefix.
    pub async fn to_literal(
        &self,
        ctx: &ConversionContext,
        artifact: &Artifact<S>,
    ) -> Result<BlobLiteral> {
        let blob_type = self.get_literal_type();
        if let Some(remote) = artifact.remote_source() {
            debug!(uri = remote, mode = ?ctx.mode(), "Remote artifact passed through");
            return Ok(BlobLiteral::new(remote, &blob_type));
        }

        if ctx.mode() == ExecutionMode::Dispatch && !artifact.is_downloaded() {
            return Err(Error::TypeMismatch(format!(
                "{} {} has a pending download and cannot be bound while dispatching",
                S::KIND,
                artifact.path()
            )));
        }

        let local = artifact.local_path().await?;
        self.check_shape(local).await?;

        let fa = ctx.file_access();
        let recursive = S::DIMENSIONALITY == BlobDimensionality::Multipart;
        let remote = if recursive {
            fa.get_random_remote_directory()
        } else {
            let file_name = local.file_name().and_then(|n| n.to_str());
            fa.get_random_remote_path(file_name)
        };
        let uri = fa.put(local, Some(remote.as_str()), recursive).await?;
        debug!(local = %local.display(), uri = %uri, kind = S::KIND, "Artifact converted");
        Ok(BlobLiteral::new(uri, &blob_type))
    }

    /// Entry point for untyped values: a JSON string is read as a path,
    /// anything else is rejected.
    pub async fn value_to_literal(
        &self,
        ctx: &ConversionContext,
        value: &serde_json::Value,
    ) -> Result<BlobLiteral> {
        match value {
            serde_json::Value::String(path) => {
                self.to_literal(ctx, &Artifact::new(path.as_str())).await
            }
            other => Err(Error::TypeMismatch(format!(
                "expected a path for a {} artifact, got {other}",
                S::KIND
            ))),
        }
    }

    /// Builds a handle for `literal` without downloading anything. The first
    /// call to [`Artifact::local_path`] pulls the content into a fresh
    /// directory of the sandbox.
    pub fn to_artifact(
        &self,
        ctx: &ConversionContext,
        literal: &BlobLiteral,
    ) -> Result<Artifact<S>> {
        if literal.dimensionality != S::DIMENSIONALITY {
            return Err(Error::TypeMismatch(format!(
                "{} literal {} cannot become a {} artifact",
                literal.dimensionality,
                literal.uri,
                S::KIND
            )));
        }

        let fa = ctx.file_access().clone();
        let staging = fa.get_random_local_directory()?;
        let recursive = S::DIMENSIONALITY == BlobDimensionality::Multipart;
        let local = if recursive {
            staging
        } else {
            staging.join(file_name_of(&literal.uri))
        };

        let uri = literal.uri.clone();
        let target = local.clone();
        Ok(Artifact::lazy(literal.uri.clone(), local, move || {
            let fa = fa.clone();
            let uri = uri.clone();
            let target = target.clone();
            async move { fa.get(&uri, &target, recursive).await }
        }))
    }

    async fn check_shape(&self, local: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(local).await.map_err(|e| {
            Error::TypeMismatch(format!(
                "expected a local {} at {}: {e}",
                S::KIND,
                local.display()
            ))
        })?;
        if S::matches(&metadata) {
            Ok(())
        } else {
            Err(Error::TypeMismatch(format!(
                "expected a {} but {} is not one",
                S::KIND,
                local.display()
            )))
        }
    }
}

fn file_name_of(uri: &str) -> &str {
    let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
    without_query
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("blob")
}
