use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a provider-level transfer, used to tag driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Get,
    Put,
    Exists,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOp::Get => write!(f, "get"),
            TransferOp::Put => write!(f, "put"),
            TransferOp::Exists => write!(f, "exists"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("persistence plugin already registered for scheme {scheme}")]
    PluginAlreadyRegistered { scheme: String },

    #[error("no persistence plugin found for path: {path}")]
    NoPluginFound { path: String },

    #[error("{driver} does not support {operation}")]
    UnsupportedOperation {
        driver: String,
        operation: String,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("access to {path} failed: {source:#}")]
    Access {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{op} {from} -> {to} failed: {source}")]
    Transfer {
        op: TransferOp,
        from: String,
        to: String,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn access(path: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Access {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn unsupported(driver: &str, operation: impl Into<String>) -> Self {
        Error::UnsupportedOperation {
            driver: driver.to_string(),
            operation: operation.into(),
        }
    }

    /// The driver error underneath any provider tagging.
    pub fn root(&self) -> &Error {
        match self {
            Error::Transfer { source, .. } => source.root(),
            other => other,
        }
    }
}
