//! Adapter configuration.
//!
//! Every field has a default matching a stock CouchDB deployment with a
//! `_design/pac4j` design document, so `ProfileStoreConfig::default()` is
//! usually all that is needed.
//!
//! ```ignore
//! let config = ProfileStoreConfig::from_json(r#"{ "write_mode": "strict" }"#)?;
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Names of the identifier and revision fields inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub id: String,
    pub revision: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: "_id".to_string(),
            revision: "_rev".to_string(),
        }
    }
}

impl FieldNames {
    pub fn new(id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: revision.into(),
        }
    }
}

/// How secondary-attribute lookups find their index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Design document holding the views, without the `_design/` prefix.
    pub design_document: String,
    /// Prefix joined to the attribute name to form the view name.
    pub prefix: String,
    /// Attribute name to view name, bypassing the prefix.
    pub overrides: HashMap<String, String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            design_document: "pac4j".to_string(),
            prefix: "by_".to_string(),
            overrides: HashMap::new(),
        }
    }
}

/// What update and delete do when the fetch or write step fails for a
/// reason other than a missing document or a conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Log the failure and report success.
    #[default]
    BestEffort,
    /// Return the failure to the caller.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileStoreConfig {
    pub fields: FieldNames,
    pub index: IndexConfig,
    pub write_mode: WriteMode,
    /// Extra fetch-merge-write rounds after a revision conflict. Zero keeps
    /// conflicts going straight back to the caller.
    pub conflict_retries: u32,
}

impl ProfileStoreConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.id.is_empty() {
            return Err(ConfigError::Invalid("id field name is empty".into()));
        }
        if self.fields.revision.is_empty() {
            return Err(ConfigError::Invalid("revision field name is empty".into()));
        }
        if self.fields.id == self.fields.revision {
            return Err(ConfigError::Invalid(format!(
                "id and revision share the field name `{}`",
                self.fields.id
            )));
        }
        if self.index.design_document.is_empty() {
            return Err(ConfigError::Invalid("design document name is empty".into()));
        }
        if let Some((field, _)) = self.index.overrides.iter().find(|(_, view)| view.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "index override for `{field}` names an empty view"
            )));
        }
        Ok(())
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_design_document(mut self, name: impl Into<String>) -> Self {
        self.index.design_document = name.into();
        self
    }

    pub fn with_index_override(mut self, field: impl Into<String>, view: impl Into<String>) -> Self {
        self.index.overrides.insert(field.into(), view.into());
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }
}
