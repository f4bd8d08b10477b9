use thiserror::Error;

use crate::metadata::MetadataError;

pub type Result<T> = std::result::Result<T, CollectorError>;

#[derive(Error, Debug)]
pub enum CollectorError {
    /// The module is not loaded or never registered the requested service.
    #[error("Module {module} does not provide service {service}")]
    ServiceNotProvided { module: String, service: String },

    #[error("Module {module} requires {required}, which is not configured")]
    MissingDependency { module: String, required: String },

    #[error("Module dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollectorError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        CollectorError::BackendUnavailable(err.to_string())
    }
}
