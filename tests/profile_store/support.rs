//! Shared fixtures for the profile store tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use couch_profiles::{
    DocumentRef, DocumentStore, InMemoryDocumentStore, IndexEmit, IndexQuery, IndexRow, Record,
    StoreError,
};
use serde_json::{json, Value};

pub const ID: &str = "_id";
pub const USERNAME: &str = "username";
pub const FIRSTNAME: &str = "first_name";
pub const LINKEDID: &str = "linkedid";

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

/// A store with the views a deployment provisions for profile lookups.
pub fn provisioned_store() -> InMemoryDocumentStore {
    InMemoryDocumentStore::new()
        .with_index("pac4j", "by_username", USERNAME)
        .with_index("pac4j", "by_linkedid", LINKEDID)
        .with_index_emitting(
            "pac4j",
            "by_first_name",
            FIRSTNAME,
            IndexEmit::Field("profile".into()),
        )
}

/// Three people, two of them sharing a username.
pub fn seeded_store() -> InMemoryDocumentStore {
    let store = provisioned_store();
    for doc in [
        json!({ ID: "idperson1", USERNAME: "jle", FIRSTNAME: "Jerome" }),
        json!({ ID: "idperson2", USERNAME: "misagh" }),
        json!({ ID: "idperson3", USERNAME: "misagh", "password": "hashed" }),
    ] {
        store.create(&record(doc)).unwrap();
    }
    store
}

/// Lets another writer win the race a configurable number of times:
/// before delegating an update or delete, it rewrites the document so the
/// revision the caller holds is stale.
#[derive(Clone)]
pub struct RacingStore {
    pub inner: InMemoryDocumentStore,
    races: Arc<AtomicU32>,
}

impl RacingStore {
    pub fn new(inner: InMemoryDocumentStore, races: u32) -> Self {
        Self {
            inner,
            races: Arc::new(AtomicU32::new(races)),
        }
    }

    fn interfere(&self, id: &str) {
        let remaining = self.races.load(Ordering::SeqCst);
        if remaining == 0 {
            return;
        }
        self.races.store(remaining - 1, Ordering::SeqCst);

        let bytes = self.inner.fetch_raw(id).unwrap();
        let mut current: Record = serde_json::from_slice(&bytes).unwrap();
        current.insert("touched_by".into(), json!("other-writer"));
        self.inner.update(&current).unwrap();
    }
}

impl DocumentStore for RacingStore {
    fn create(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        self.inner.create(document)
    }

    fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.fetch_raw(id)
    }

    fn update(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        if let Some(id) = document.get(ID).and_then(Value::as_str) {
            self.interfere(id);
        }
        self.inner.update(document)
    }

    fn delete(&self, id: &str, revision: &str) -> Result<(), StoreError> {
        self.interfere(id);
        self.inner.delete(id, revision)
    }

    fn query_index(&self, query: &IndexQuery) -> Result<Vec<IndexRow>, StoreError> {
        self.inner.query_index(query)
    }
}
