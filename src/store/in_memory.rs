//! InMemoryDocumentStore - BTreeMap-backed document store for testing and development.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{DocumentRef, DocumentStore, StoreError};
use crate::config::FieldNames;
use crate::index::{IndexQuery, IndexRow};
use crate::record::Record;

/// Internal stored representation of a document.
struct StoredDocument {
    bytes: Vec<u8>,
    revision: String,
    generation: u64,
}

/// What a view emits as the row value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEmit {
    /// The whole stored document.
    Document,
    /// A single field of the document (`null` when absent).
    Field(String),
}

#[derive(Debug, Clone)]
struct IndexDefinition {
    key_field: String,
    emit: IndexEmit,
}

/// In-memory document store with CouchDB-style revisions.
///
/// Revisions look like `<generation>-<hash>` and change on every write.
/// Documents are kept in id order, which is also the row order of index
/// queries. Clone-friendly via Arc: clones share documents, not index
/// definitions added after the clone.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    fields: FieldNames,
    documents: Arc<RwLock<BTreeMap<String, StoredDocument>>>,
    indexes: HashMap<(String, String), IndexDefinition>,
    id_seq: Arc<AtomicU64>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create an empty store using `_id` and `_rev`.
    pub fn new() -> Self {
        Self::with_field_names(FieldNames::default())
    }

    pub fn with_field_names(fields: FieldNames) -> Self {
        Self {
            fields,
            documents: Arc::new(RwLock::new(BTreeMap::new())),
            indexes: HashMap::new(),
            id_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Define a view keyed by `key_field` that emits the whole document.
    pub fn with_index(self, design_document: &str, view: &str, key_field: &str) -> Self {
        self.with_index_emitting(design_document, view, key_field, IndexEmit::Document)
    }

    pub fn with_index_emitting(
        mut self,
        design_document: &str,
        view: &str,
        key_field: &str,
        emit: IndexEmit,
    ) -> Self {
        self.indexes.insert(
            (design_document.to_string(), view.to_string()),
            IndexDefinition {
                key_field: key_field.to_string(),
                emit,
            },
        );
        self
    }

    /// Store raw bytes under `id` without validating them. Useful for
    /// seeding documents a well-behaved client would never write.
    pub fn insert_raw(&self, id: &str, bytes: Vec<u8>) -> Result<DocumentRef, StoreError> {
        let revision = revision_for(1, &bytes);
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        documents.insert(
            id.to_string(),
            StoredDocument {
                bytes,
                revision: revision.clone(),
                generation: 1,
            },
        );
        Ok(DocumentRef {
            id: id.to_string(),
            revision,
        })
    }

    /// Current revision of a document, if present.
    pub fn revision_of(&self, id: &str) -> Option<String> {
        self.documents
            .read()
            .ok()
            .and_then(|documents| documents.get(id).map(|d| d.revision.clone()))
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_id(&self) -> String {
        format!("{:032x}", self.id_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Serialize with id and revision leading, like CouchDB returns documents.
    fn encode(
        &self,
        id: &str,
        generation: u64,
        document: &Record,
    ) -> Result<(Vec<u8>, String), StoreError> {
        let mut body = Record::new();
        for (name, value) in document {
            if name != &self.fields.id && name != &self.fields.revision {
                body.insert(name.clone(), value.clone());
            }
        }
        let content = serde_json::to_vec(&body).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let revision = revision_for(generation, &content);

        let mut stored = Record::new();
        stored.insert(self.fields.id.clone(), Value::String(id.to_string()));
        stored.insert(self.fields.revision.clone(), Value::String(revision.clone()));
        stored.extend(body);

        let bytes = serde_json::to_vec(&stored).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok((bytes, revision))
    }

    fn document_id(&self, document: &Record) -> Result<Option<String>, StoreError> {
        match document.get(&self.fields.id) {
            None => Ok(None),
            Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
            Some(_) => Err(StoreError::Unavailable(format!(
                "field `{}` must be a non-empty string",
                self.fields.id
            ))),
        }
    }
}

fn revision_for(generation: u64, content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    generation.hash(&mut hasher);
    content.hash(&mut hasher);
    format!("{}-{:016x}", generation, hasher.finish())
}

impl DocumentStore for InMemoryDocumentStore {
    fn create(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        let id = match self.document_id(document)? {
            Some(id) => id,
            None => self.next_id(),
        };
        let (bytes, revision) = self.encode(&id, 1, document)?;

        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        if documents.contains_key(&id) {
            return Err(StoreError::Conflict {
                id,
                reason: "document already exists".into(),
            });
        }

        documents.insert(
            id.clone(),
            StoredDocument {
                bytes,
                revision: revision.clone(),
                generation: 1,
            },
        );

        Ok(DocumentRef { id, revision })
    }

    fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        documents
            .get(id)
            .map(|stored| stored.bytes.clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn update(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        let id = self.document_id(document)?.ok_or_else(|| {
            StoreError::Unavailable(format!("update without `{}`", self.fields.id))
        })?;
        let supplied = document.get(&self.fields.revision).and_then(Value::as_str);

        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        let stored = documents
            .get(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        if supplied != Some(stored.revision.as_str()) {
            return Err(StoreError::Conflict {
                id,
                reason: format!(
                    "revision {} does not match current {}",
                    supplied.unwrap_or("<none>"),
                    stored.revision
                ),
            });
        }

        let generation = stored.generation + 1;
        let (bytes, revision) = self.encode(&id, generation, document)?;
        documents.insert(
            id.clone(),
            StoredDocument {
                bytes,
                revision: revision.clone(),
                generation,
            },
        );

        Ok(DocumentRef { id, revision })
    }

    fn delete(&self, id: &str, revision: &str) -> Result<(), StoreError> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        let current = documents
            .get(id)
            .map(|stored| stored.revision.clone())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if current != revision {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                reason: format!("revision {revision} does not match current {current}"),
            });
        }

        documents.remove(id);
        Ok(())
    }

    fn query_index(&self, query: &IndexQuery) -> Result<Vec<IndexRow>, StoreError> {
        let definition = self
            .indexes
            .get(&(query.design_document.clone(), query.view.clone()))
            .ok_or_else(|| {
                StoreError::Unavailable(format!(
                    "no view _design/{}/_view/{}",
                    query.design_document, query.view
                ))
            })?;

        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        let key = Value::String(query.key.clone());
        let mut rows = Vec::new();

        for (id, stored) in documents.iter() {
            // Documents that are not JSON objects never match a view.
            let Ok(Value::Object(document)) = serde_json::from_slice::<Value>(&stored.bytes) else {
                continue;
            };
            if document.get(&definition.key_field) != Some(&key) {
                continue;
            }

            let value = match &definition.emit {
                IndexEmit::Field(field) => document.get(field).cloned().unwrap_or(Value::Null),
                IndexEmit::Document => Value::Object(document),
            };

            rows.push(IndexRow {
                id: Some(id.clone()),
                key: key.clone(),
                value,
            });
        }

        Ok(rows)
    }
}
