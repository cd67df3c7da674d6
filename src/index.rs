//! Mapping attribute names onto pre-provisioned index views.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

use crate::config::IndexConfig;

/// A named view inside a design document, queried by exact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub design_document: String,
    pub view: String,
    pub key: String,
}

/// One row of an index query result.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    /// Id of the document that emitted the row, when the store reports it.
    pub id: Option<String>,
    pub key: Value,
    /// The value the view emitted.
    pub value: Value,
}

impl IndexRow {
    /// Text handed to the document codec. A string value is taken verbatim,
    /// since views often emit a profile already serialized to JSON; any
    /// other value is rendered as JSON.
    pub fn payload(&self) -> Cow<'_, str> {
        match &self.value {
            Value::String(text) => Cow::Borrowed(text),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// Resolves the view that answers lookups on a given attribute.
pub trait IndexNaming: Send + Sync {
    fn design_document(&self) -> &str;

    fn view_for(&self, field: &str) -> String;

    fn query(&self, field: &str, key: &str) -> IndexQuery {
        IndexQuery {
            design_document: self.design_document().to_string(),
            view: self.view_for(field),
            key: key.to_string(),
        }
    }
}

/// `<prefix><field>` views (default `by_<field>`), with per-field overrides.
#[derive(Debug, Clone)]
pub struct ConventionalIndexNaming {
    design_document: String,
    prefix: String,
    overrides: HashMap<String, String>,
}

impl ConventionalIndexNaming {
    pub fn new(design_document: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            design_document: design_document.into(),
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, field: impl Into<String>, view: impl Into<String>) -> Self {
        self.overrides.insert(field.into(), view.into());
        self
    }
}

impl Default for ConventionalIndexNaming {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for ConventionalIndexNaming {
    fn from(config: &IndexConfig) -> Self {
        Self {
            design_document: config.design_document.clone(),
            prefix: config.prefix.clone(),
            overrides: config.overrides.clone(),
        }
    }
}

impl IndexNaming for ConventionalIndexNaming {
    fn design_document(&self) -> &str {
        &self.design_document
    }

    fn view_for(&self, field: &str) -> String {
        match self.overrides.get(field) {
            Some(view) => view.clone(),
            None => format!("{}{}", self.prefix, field),
        }
    }
}
