//! ProfileStore - revision-safe persistence of profile records.
//!
//! Every write that touches an existing document reads it first to learn
//! its current revision, then hands that revision back to the store. A
//! missing document is always a soft condition: reads return nothing,
//! deletes do nothing, updates fall back to an insert.
//!
//! ## Example
//!
//! ```ignore
//! use couch_profiles::{InMemoryDocumentStore, ProfileStore, Projection};
//!
//! let store = InMemoryDocumentStore::new().with_index("pac4j", "by_username", "username");
//! let profiles = ProfileStore::new(store);
//!
//! profiles.insert(record)?;
//! let found = profiles.read(&Projection::fields(["username"]), "_id", "p1")?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::codec::DocumentCodec;
use crate::config::{ProfileStoreConfig, WriteMode};
use crate::error::{ConfigError, ProfileStoreError};
use crate::index::{ConventionalIndexNaming, IndexNaming};
use crate::record::{Projection, Record};
use crate::store::{DocumentStore, StoreError};
use crate::Result;

/// Adapter between a generic profile service and a [`DocumentStore`].
pub struct ProfileStore<S> {
    store: S,
    config: ProfileStoreConfig,
    codec: DocumentCodec,
    naming: Arc<dyn IndexNaming>,
}

impl<S: DocumentStore> ProfileStore<S> {
    pub fn new(store: S) -> Self {
        Self::build(store, ProfileStoreConfig::default())
    }

    /// Build an adapter with `config`, rejecting configurations that fail
    /// [`ProfileStoreConfig::validate`].
    pub fn with_config(store: S, config: ProfileStoreConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    fn build(store: S, config: ProfileStoreConfig) -> Self {
        let naming = Arc::new(ConventionalIndexNaming::from(&config.index));
        Self {
            store,
            config,
            codec: DocumentCodec::new(),
            naming,
        }
    }

    /// Replace the index naming derived from the configuration.
    pub fn with_index_naming(mut self, naming: impl IndexNaming + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ProfileStoreConfig {
        &self.config
    }

    pub fn id_field(&self) -> &str {
        &self.config.fields.id
    }

    /// Create a new document from `record`. Any revision field is dropped;
    /// the remaining fields keep their order.
    pub fn insert(&self, mut record: Record) -> Result<()> {
        record.shift_remove(&self.config.fields.revision);
        debug!(id = ?self.record_id(&record), fields = record.len(), "Inserting document");

        let created = self.store.create(&record)?;
        debug!(id = %created.id, revision = %created.revision, "Document inserted");
        Ok(())
    }

    /// Replace the stored document with `record`, creating it when absent.
    ///
    /// In best-effort mode, fetch and write failures other than conflicts
    /// are logged and reported as success.
    pub fn update(&self, mut record: Record) -> Result<()> {
        let id = self.record_id(&record).ok_or_else(|| {
            ProfileStoreError::InvalidArgument(format!(
                "record has no string `{}` field",
                self.config.fields.id
            ))
        })?;

        let mut retries = 0;
        loop {
            let revision = match self.current_revision(&id) {
                Ok(Some(revision)) => revision,
                Ok(None) => {
                    debug!(id = %id, "No document to update, inserting instead");
                    return self.insert(record);
                }
                Err(err) => return self.tolerate("update", &id, err),
            };

            record.insert(self.config.fields.revision.clone(), Value::String(revision));
            debug!(id = %id, fields = record.len(), "Updating document");

            match self.store.update(&record) {
                Ok(updated) => {
                    debug!(id = %id, revision = %updated.revision, "Document updated");
                    return Ok(());
                }
                Err(StoreError::NotFound { .. }) => {
                    debug!(id = %id, "Document vanished before update, inserting instead");
                    return self.insert(record);
                }
                Err(StoreError::Conflict { reason, .. }) if retries < self.config.conflict_retries => {
                    retries += 1;
                    warn!(id = %id, attempt = retries, reason = %reason, "Update conflict, retrying");
                }
                Err(err) => return self.tolerate("update", &id, err.into()),
            }
        }
    }

    /// Delete the document with `id`. Deleting a missing document succeeds.
    pub fn delete_by_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(ProfileStoreError::InvalidArgument("empty id".into()));
        }
        debug!(id = %id, "Deleting document");

        let mut retries = 0;
        loop {
            let revision = match self.current_revision(id) {
                Ok(Some(revision)) => revision,
                Ok(None) => {
                    debug!(id = %id, "Document is not in the database");
                    return Ok(());
                }
                Err(err) => return self.tolerate("delete", id, err),
            };

            match self.store.delete(id, &revision) {
                Ok(()) => {
                    debug!(id = %id, "Document deleted");
                    return Ok(());
                }
                Err(StoreError::NotFound { .. }) => {
                    debug!(id = %id, "Document already deleted");
                    return Ok(());
                }
                Err(StoreError::Conflict { reason, .. }) if retries < self.config.conflict_retries => {
                    retries += 1;
                    warn!(id = %id, attempt = retries, reason = %reason, "Delete conflict, retrying");
                }
                Err(err) => return self.tolerate("delete", id, err.into()),
            }
        }
    }

    /// Find records whose `key` equals `value`.
    ///
    /// When `key` is the id field this is a direct fetch returning at most
    /// one record; otherwise the index named for `key` is queried. The
    /// revision field is never part of the result.
    pub fn read(&self, names: &Projection, key: &str, value: &str) -> Result<Vec<Record>> {
        if key.is_empty() {
            return Err(ProfileStoreError::InvalidArgument("empty lookup key".into()));
        }
        debug!(key = %key, value = %value, "Reading documents");

        let records = if key == self.config.fields.id {
            self.read_by_id(names, value)?
        } else {
            self.read_by_index(names, key, value)?
        };

        debug!(key = %key, found = records.len(), "Read complete");
        Ok(records)
    }

    fn read_by_id(&self, names: &Projection, id: &str) -> Result<Vec<Record>> {
        let bytes = match self.store.fetch_raw(id) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match self.codec.decode(&bytes) {
            Ok(document) => Ok(vec![names.apply(document, &self.config.fields.revision)]),
            Err(err) => {
                warn!(id = %id, error = %err, "Skipping undecodable document");
                Ok(Vec::new())
            }
        }
    }

    fn read_by_index(&self, names: &Projection, key: &str, value: &str) -> Result<Vec<Record>> {
        let query = self.naming.query(key, value);
        debug!(
            design_document = %query.design_document,
            view = %query.view,
            "Querying index"
        );

        let rows = self.store.query_index(&query)?;
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            match self.codec.decode_str(&row.payload()) {
                Ok(document) => records.push(names.apply(document, &self.config.fields.revision)),
                Err(err) => {
                    warn!(
                        view = %query.view,
                        row_id = ?row.id,
                        error = %err,
                        "Skipping undecodable index row"
                    );
                }
            }
        }

        Ok(records)
    }

    /// Revision of the stored document, or `None` when it does not exist.
    fn current_revision(&self, id: &str) -> Result<Option<String>> {
        let bytes = match self.store.fetch_raw(id) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let document = self.codec.decode(&bytes)?;
        let revision = self.codec.revision(&document, &self.config.fields.revision)?;
        Ok(Some(revision))
    }

    /// Apply the write mode to a failed update or delete.
    fn tolerate(&self, operation: &str, id: &str, err: ProfileStoreError) -> Result<()> {
        if err.is_conflict() || self.config.write_mode == WriteMode::Strict {
            return Err(err);
        }
        error!(operation, id = %id, error = %err, "Write dropped");
        Ok(())
    }

    fn record_id(&self, record: &Record) -> Option<String> {
        record
            .get(&self.config.fields.id)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

impl<S> fmt::Debug for ProfileStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("store", &std::any::type_name::<S>())
            .field("config", &self.config)
            .field("design_document", &self.naming.design_document())
            .finish()
    }
}
