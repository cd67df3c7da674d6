//! CouchDB HTTP transport.
//!
//! Requires the `couchdb` feature. Uses a blocking reqwest client, so it
//! must not be driven from inside an async runtime thread.
//!
//! ## Requests
//!
//! - `POST /{db}` creates a document without an id.
//! - `PUT /{db}/{id}` creates or (with `_rev`) updates a document.
//! - `GET /{db}/{id}` fetches a document.
//! - `DELETE /{db}/{id}?rev=...` deletes a document.
//! - `GET /{db}/_design/{ddoc}/_view/{view}?key=<json>` queries a view.
//!
//! CouchDB always names the id and revision fields `_id` and `_rev`; use the
//! default [`FieldNames`](crate::FieldNames) with this store.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{DocumentRef, DocumentStore, StoreError};
use crate::index::{IndexQuery, IndexRow};
use crate::record::Record;

const ID_FIELD: &str = "_id";

/// Connection settings for [`CouchDbStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouchDbConfig {
    /// Server base URL, e.g. `http://127.0.0.1:5984`.
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CouchDbConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5984".to_string(),
            database: "users".to_string(),
            username: None,
            password: None,
            timeout_ms: 10_000,
        }
    }
}

impl CouchDbConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
    rev: String,
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    #[serde(default)]
    id: Option<String>,
    key: Value,
    value: Value,
}

/// [`DocumentStore`] backed by a CouchDB database over HTTP.
#[derive(Debug, Clone)]
pub struct CouchDbStore {
    client: Client,
    base: Url,
    config: CouchDbConfig,
}

impl CouchDbStore {
    pub fn new(config: CouchDbConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::Unavailable(format!("invalid CouchDB url {}: {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "CouchDB url {} cannot be a base",
                config.url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(transport)?;

        Ok(Self { client, base, config })
    }

    pub fn config(&self) -> &CouchDbConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .push(&self.config.database)
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_ref()),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder, id: &str) -> Result<Response, StoreError> {
        let response = self.authorized(request).send().map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound { id: id.to_string() },
            StatusCode::CONFLICT => StoreError::Conflict {
                id: id.to_string(),
                reason: body,
            },
            _ => StoreError::Unavailable(format!("CouchDB answered {status}: {body}")),
        })
    }

    fn written(response: Response) -> Result<DocumentRef, StoreError> {
        let written: WriteResponse = response.json().map_err(transport)?;
        Ok(DocumentRef {
            id: written.id,
            revision: written.rev,
        })
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn document_id(document: &Record) -> Option<&str> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

impl DocumentStore for CouchDbStore {
    fn create(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        let response = match document_id(document) {
            Some(id) => {
                let request = self.client.put(self.url(&[id])?).json(document);
                self.send(request, id)?
            }
            None => {
                let request = self.client.post(self.url(&[])?).json(document);
                self.send(request, "")?
            }
        };
        Self::written(response)
    }

    fn fetch_raw(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(self.client.get(self.url(&[id])?), id)?;
        let bytes = response.bytes().map_err(transport)?;
        Ok(bytes.to_vec())
    }

    fn update(&self, document: &Record) -> Result<DocumentRef, StoreError> {
        let id = document_id(document)
            .ok_or_else(|| StoreError::Unavailable(format!("update without `{ID_FIELD}`")))?;
        let request = self.client.put(self.url(&[id])?).json(document);
        Self::written(self.send(request, id)?)
    }

    fn delete(&self, id: &str, revision: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.url(&[id])?)
            .query(&[("rev", revision)]);
        self.send(request, id)?;
        Ok(())
    }

    fn query_index(&self, query: &IndexQuery) -> Result<Vec<IndexRow>, StoreError> {
        let url = self.url(&["_design", &query.design_document, "_view", &query.view])?;
        let key = serde_json::to_string(&query.key).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(url = %url, key = %key, "Querying CouchDB view");

        let response = match self.send(self.client.get(url).query(&[("key", key)]), &query.view) {
            Ok(response) => response,
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::Unavailable(format!(
                    "view _design/{}/_view/{} does not exist",
                    query.design_document, query.view
                )))
            }
            Err(err) => return Err(err),
        };

        let view: ViewResponse = response.json().map_err(transport)?;
        Ok(view
            .rows
            .into_iter()
            .map(|row| IndexRow {
                id: row.id,
                key: row.key,
                value: row.value,
            })
            .collect())
    }
}
