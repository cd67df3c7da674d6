//! Records and field projection.

use serde_json::{Map, Value};

/// An untyped attribute bag, in document field order.
pub type Record = Map<String, Value>;

/// Which fields a read should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every stored field except the revision.
    #[default]
    All,
    /// Only the listed fields that are present in the document.
    Fields(Vec<String>),
}

impl Projection {
    pub fn all() -> Self {
        Projection::All
    }

    /// Restrict reads to `names`. An empty list means every field.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            Projection::All
        } else {
            Projection::Fields(names)
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Fields(names) => names.iter().any(|n| n == name),
        }
    }

    /// Apply the projection to a decoded document. `hidden` is dropped even
    /// when explicitly requested.
    pub fn apply(&self, record: Record, hidden: &str) -> Record {
        record
            .into_iter()
            .filter(|(name, _)| name != hidden && self.includes(name))
            .collect()
    }
}

impl From<Option<Vec<String>>> for Projection {
    fn from(names: Option<Vec<String>>) -> Self {
        names.map(Projection::fields).unwrap_or_default()
    }
}
