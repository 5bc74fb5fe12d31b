pub mod artifact;
pub mod config;
pub mod error;
pub mod file_access;
pub mod literal;
pub mod persistence;
pub mod registry;
pub mod scheme;
pub mod transformer;

pub use artifact::{Artifact, ArtifactDir, ArtifactFile};
pub use config::PersistenceConfig;
pub use error::{Error, Result};
pub use file_access::FileAccessProvider;
pub use literal::{BlobDimensionality, BlobLiteral, BlobType};
pub use persistence::DataPersistence;
pub use registry::PersistenceRegistry;
pub use transformer::{
    BlobTransformer, ConversionContext, DirTransformer, ExecutionMode, FileTransformer,
};
