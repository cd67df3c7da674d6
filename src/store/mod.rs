//! Document store client abstraction.
//!
//! The adapter only ever talks to a [`DocumentStore`]. Two implementations
//! ship with the crate:
//!
//! - [`InMemoryDocumentStore`]: CouchDB-like semantics in a `BTreeMap`, for
//!   tests and development.
//! - `CouchDbStore` (feature `couchdb`): a blocking HTTP client for a real
//!   CouchDB server.

mod in_memory;

#[cfg(feature = "couchdb")]
pub mod couchdb;

use thiserror::Error;

use crate::index::{IndexQuery, IndexRow};
use crate::record::Record;

pub use in_memory::{IndexEmit, InMemoryDocumentStore};

/// Identity of a document after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub revision: String,
}

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("document conflict on {id}: {reason}")]
    Conflict { id: String, reason: String },

    #[error("{0}")]
    Unavailable(String),
}

/// CRUD and index access against a single collection of JSON documents.
///
/// Writes that replace or remove an existing document must carry its current
/// revision; the store rejects anything else with [`StoreError::Conflict`].
pub trait DocumentStore: Send + Sync {
    /// Create a new document. The store assigns an id if the record has none.
    fn create(&self, document: &Record) -> Result<DocumentRef, StoreError>;

    /// Fetch the stored document as raw JSON bytes.
    fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace an existing document. The record must carry its id and the
    /// revision it was read at.
    fn update(&self, document: &Record) -> Result<DocumentRef, StoreError>;

    /// Remove a document at the given revision.
    fn delete(&self, id: &str, revision: &str) -> Result<(), StoreError>;

    /// Run an exact-key query against a named view.
    fn query_index(&self, query: &IndexQuery) -> Result<Vec<IndexRow>, StoreError>;
}
