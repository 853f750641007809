use thiserror::Error;

use crate::metadata::MetadataError;
use crate::network::ClientError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Movie not found: {0}")]
    MovieNotFound(i64),

    #[error("Invalid metadata status: {0}")]
    InvalidMetadataStatus(String),

    #[error("Invalid failure reason: {0}")]
    InvalidFailureReason(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[from] ClientError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for lookups that found nothing, as opposed to failures.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MovieNotFound(_) | Self::Metadata(MetadataError::NotFound(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
