use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};


pub type Patch = Map<String, Value>;

/// A document owned by the data store. The cascade only ever reads it and
/// hands the store patches or deletions keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    
    pub fn references(&self, field: &str, value: &str) -> bool {
        self.get_str(field) == Some(value)
    }

    /// Blob ids held by `field`, whether stored as a single id or a list.
    pub fn blob_ids(&self, field: &str) -> Vec<String> {
        match self.fields.get(field) {
            Some(Value::String(id)) if !id.is_empty() => vec![id.clone()],
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn apply(&mut self, patch: Patch) {
        for (field, value) in patch {
            self.fields.insert(field, value);
        }
    }
}
