//! Error types for the proofstore engine.

use crate::{RecordId, ResourceType};
use thiserror::Error;

/// All possible errors from the proofstore engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Store errors
    #[error("'{resource_type}/{id}' not found")]
    NotFound {
        resource_type: ResourceType,
        id: RecordId,
    },

    #[error("malformed resource: {0}")]
    MalformedResource(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("version counter exhausted")]
    VersionsExhausted,

    // Search errors
    #[error("no search parameter found for '{0}'")]
    UnknownParameter(String),

    #[error("universal parameter of '{0}' is not supported")]
    UnsupportedUniversalParameter(String),

    #[error("no search evaluator defined for '{0}' searches")]
    MissingEvaluator(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // Transaction errors
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("conditional create failed with status {status}: {message}")]
    ConditionalCreateFailed { status: u16, message: String },

    // Operation errors
    #[error("no operation defined for '{0}'")]
    UnknownOperation(String),
}

impl Error {
    /// Shorthand for a missing `type/id` pair.
    pub fn not_found(resource_type: impl Into<ResourceType>, id: impl Into<RecordId>) -> Self {
        Error::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
