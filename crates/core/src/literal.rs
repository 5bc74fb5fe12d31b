use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlobDimensionality {
    /// One object.
    Single,
    /// A directory-like collection of objects under a common prefix.
    Multipart,
}

impl fmt::Display for BlobDimensionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobDimensionality::Single => write!(f, "SINGLE"),
            BlobDimensionality::Multipart => write!(f, "MULTIPART"),
        }
    }
}

/// Declared type of a blob: its shape plus a free-form format tag such as `"csv"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobType {
    #[serde(default)]
    pub format: String,
    pub dimensionality: BlobDimensionality,
}

/// Wire representation of an artifact handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLiteral {
    pub uri: String,
    pub dimensionality: BlobDimensionality,
    #[serde(default)]
    pub format: String,
}

impl BlobLiteral {
    pub fn new(uri: impl Into<String>, blob_type: &BlobType) -> Self {
        Self {
            uri: uri.into(),
            dimensionality: blob_type.dimensionality,
            format: blob_type.format.clone(),
        }
    }

    pub fn blob_type(&self) -> BlobType {
        BlobType {
            format: self.format.clone(),
            dimensionality: self.dimensionality,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
