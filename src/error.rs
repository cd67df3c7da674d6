use thiserror::Error;

use crate::codec::CodecError;
use crate::store::StoreError;

/// Errors surfaced by the profile persistence adapter.
///
/// A missing document is never one of these: reads turn it into an empty
/// result, deletes into a no-op and updates into an insert.
#[derive(Debug, Error)]
pub enum ProfileStoreError {
    /// Revision mismatch on update/delete, or duplicate id on create.
    #[error("document conflict on {id}: {reason}")]
    Conflict { id: String, reason: String },

    /// The document store could not be reached or answered with a failure.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored document could not be decoded.
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] CodecError),

    /// The caller passed an unusable key, id or record.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ProfileStoreError {
    /// Conflicts are the only failures that mean another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProfileStoreError::Conflict { .. })
    }
}

impl From<StoreError> for ProfileStoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { id, reason } => ProfileStoreError::Conflict { id, reason },
            StoreError::NotFound { id } => {
                ProfileStoreError::StoreUnavailable(format!("document {id} not found"))
            }
            StoreError::Unavailable(message) => ProfileStoreError::StoreUnavailable(message),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
