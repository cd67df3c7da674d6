//! Revision-safe persistence of user profile records in a CouchDB-style
//! document store.
//!
//! [`ProfileStore`] sits beneath a generic profile service and offers the
//! four operations it needs: insert, update, delete by id, and read by id or
//! by any attribute backed by a pre-provisioned view.

mod codec;
mod config;
mod error;
mod index;
mod profile_store;
mod record;
mod repository;
pub mod store;

pub use codec::{CodecError, DocumentCodec};
pub use config::{FieldNames, IndexConfig, ProfileStoreConfig, WriteMode};
pub use error::{ConfigError, ProfileStoreError};
pub use index::{ConventionalIndexNaming, IndexNaming, IndexQuery, IndexRow};
pub use profile_store::ProfileStore;
pub use record::{Projection, Record};
pub use repository::{ProfileRepository, ProfileRepositoryExt};
pub use store::{DocumentRef, DocumentStore, InMemoryDocumentStore, IndexEmit, StoreError};

#[cfg(feature = "couchdb")]
pub use store::couchdb::{CouchDbConfig, CouchDbStore};

/// Result type for profile store operations.
pub type Result<T> = std::result::Result<T, ProfileStoreError>;
