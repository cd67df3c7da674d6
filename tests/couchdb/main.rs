//! CouchDB HTTP transport tests.
//!
//! Starts a fake CouchDB with axum and drives it through the blocking client.


use couch_profiles::{
    CouchDbConfig, CouchDbStore, DocumentStore, InMemoryDocumentStore, IndexEmit, IndexQuery,
    ProfileRepositoryExt, ProfileStore, Projection, Record, StoreError,
};
use fake_server::FakeCouch;
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn backing_store() -> InMemoryDocumentStore {
    InMemoryDocumentStore::new().with_index("pac4j", "by_username", "username")
}

fn client(server: &FakeCouch) -> CouchDbStore {
    CouchDbStore::new(CouchDbConfig::new(server.base_url.clone(), "users")).unwrap()
}

#[test]
fn create_fetch_update_delete_round_trip() {
    let server = FakeCouch::start(backing_store());
    let couch = client(&server);

    let created = couch
        .create(&record(json!({ "_id": "p1", "username": "alice" })))
        .unwrap();
    assert_eq!(created.id, "p1");

    let raw = couch.fetch_raw("p1").unwrap();
    let mut doc: Record = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["_rev"], created.revision.as_str());

    doc.insert("username".into(), json!("alice2"));
    let updated = couch.update(&doc).unwrap();
    assert_ne!(updated.revision, created.revision);

    couch.delete("p1", &updated.revision).unwrap();
    let err = couch.fetch_raw("p1").unwrap_err();
    assert_eq!(err, StoreError::NotFound { id: "p1".into() });
}

#[test]
fn create_without_id_posts_to_database() {
    let store = backing_store();
    let server = FakeCouch::start(store.clone());
    let couch = client(&server);

    let created = couch.create(&record(json!({ "username": "anon" }))).unwrap();
    assert!(!created.id.is_empty());
    assert!(store.fetch_raw(&created.id).is_ok());
}

#[test]
fn status_codes_map_to_store_errors() {
    let server = FakeCouch::start(backing_store());
    let couch = client(&server);

    couch.create(&record(json!({ "_id": "p1" }))).unwrap();

    let err = couch.create(&record(json!({ "_id": "p1" }))).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let err = couch
        .update(&record(json!({ "_id": "p1", "_rev": "1-stale" })))
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let err = couch.delete("p1", "1-stale").unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let err = couch.fetch_raw("ghost").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn ids_with_reserved_characters_survive_the_trip() {
    let server = FakeCouch::start(backing_store());
    let couch = client(&server);

    couch
        .create(&record(json!({ "_id": "org/alice smith", "username": "a" })))
        .unwrap();
    let raw = couch.fetch_raw("org/alice smith").unwrap();
    let doc: Record = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["_id"], "org/alice smith");
}

#[test]
fn view_query_returns_rows() {
    let server = FakeCouch::start(backing_store());
    let couch = client(&server);

    couch.create(&record(json!({ "_id": "a", "username": "multi" }))).unwrap();
    couch.create(&record(json!({ "_id": "b", "username": "multi" }))).unwrap();
    couch.create(&record(json!({ "_id": "c", "username": "solo" }))).unwrap();

    let rows = couch
        .query_index(&IndexQuery {
            design_document: "pac4j".into(),
            view: "by_username".into(),
            key: "multi".into(),
        })
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id.as_deref(), Some("a"));
    assert_eq!(rows[0].key, json!("multi"));
    assert_eq!(rows[1].value["_id"], "b");
}

#[test]
fn missing_view_is_unavailable() {
    let server = FakeCouch::start(backing_store());
    let couch = client(&server);

    let err = couch
        .query_index(&IndexQuery {
            design_document: "pac4j".into(),
            view: "by_email".into(),
            key: "x".into(),
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[test]
fn unreachable_server_is_unavailable() {
    let config = CouchDbConfig {
        timeout_ms: 500,
        ..CouchDbConfig::new("http://127.0.0.1:9", "users")
    };
    let couch = CouchDbStore::new(config).unwrap();

    let err = couch.fetch_raw("p1").unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[test]
fn profile_store_over_http() {
    let server = FakeCouch::start(backing_store());
    let profiles = ProfileStore::new(client(&server));

    profiles
        .insert(record(json!({ "_id": "p1", "username": "alice" })))
        .unwrap();
    profiles
        .update(record(json!({ "_id": "p1", "username": "alice2" })))
        .unwrap();

    let found = profiles
        .read(&Projection::fields(["_id", "username"]), "username", "alice2")
        .unwrap();
    assert_eq!(found, vec![record(json!({ "_id": "p1", "username": "alice2" }))]);

    profiles.delete_by_id("p1").unwrap();
    profiles.delete_by_id("p1").unwrap();
    assert!(profiles.find_by_id("p1").unwrap().is_none());
}

#[test]
fn serialized_profiles_in_view_rows_are_decoded() {
    let store = InMemoryDocumentStore::new().with_index_emitting(
        "pac4j",
        "by_first_name",
        "first_name",
        IndexEmit::Field("profile".into()),
    );
    store
        .create(&record(json!({
            "_id": "p1",
            "first_name": "Sam",
            "profile": r#"{"nick":"sam-a"}"#,
        })))
        .unwrap();
    store
        .create(&record(json!({ "_id": "p2", "first_name": "Sam", "profile": "legacy-blob" })))
        .unwrap();
    let server = FakeCouch::start(store);
    let profiles = ProfileStore::new(client(&server));

    let found = profiles.read(&Projection::all(), "first_name", "Sam").unwrap();
    assert_eq!(found, vec![record(json!({ "nick": "sam-a" }))]);
}
