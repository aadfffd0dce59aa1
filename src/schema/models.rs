use serde::{Deserialize, Serialize};

use super::heuristics::looks_like_storage_field;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub name: String,
    #[serde(default)]
    pub is_identity_reference: bool,
    #[serde(default)]
    pub is_optional: bool,
    /// Explicit blob annotation. `None` falls back to the naming heuristic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_storage_reference: Option<bool>,
}

impl FieldDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_identity_reference: false,
            is_optional: false,
            is_storage_reference: None,
        }
    }

    pub fn identity(name: &str) -> Self {
        Self {
            is_identity_reference: true,
            ..Self::new(name)
        }
    }

    pub fn storage(name: &str) -> Self {
        Self {
            is_storage_reference: Some(true),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn is_blob_reference(&self) -> bool {
        self.is_storage_reference
            .unwrap_or_else(|| looks_like_storage_field(&self.name))
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub fields: Vec<String>,
}

impl IndexDescription {
    pub fn new(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// An equality lookup on `field` can use this index only if it leads.
    pub fn covers(&self, field: &str) -> bool {
        self.fields.first().map(String::as_str) == Some(field)
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescription>,
    #[serde(default)]
    pub indexes: Vec<IndexDescription>,
}

impl TableDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescription) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn index(mut self, name: &str, fields: &[&str]) -> Self {
        self.indexes.push(IndexDescription::new(name, fields));
        self
    }

    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_identity_reference)
    }

    pub fn blob_fields(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_blob_reference())
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexDescription> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Normalized table/field/index metadata emitted by the host schema tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableDescription>,
}

impl SchemaDescription {
    pub fn new(tables: Vec<TableDescription>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }
}
