use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::core::error::{ErasureError, Result};

/// What happens to one identity-reference field when the identity it points
/// at is deleted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    Delete,
    Reassign,
    Anonymize,
    Preserve,
}

impl Strategy {
    /// Order in which the fields of one table are processed. Deleting first
    /// means later strategies never touch a document that is about to vanish.
    pub fn priority(self) -> u8 {
        match self {
            Self::Delete => 0,
            Self::Reassign => 1,
            Self::Anonymize => 2,
            Self::Preserve => 3,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub fields: BTreeMap<String, Strategy>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_indexes: BTreeMap<String, String>,
}

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}

fn default_index_name() -> String {
    crate::DEFAULT_INDEX_NAME.to_string()
}

impl TableConfig {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            batch_size: default_batch_size(),
            index_name: default_index_name(),
            field_indexes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: &str, strategy: Strategy) -> Self {
        self.fields.insert(field.to_string(), strategy);
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn index(mut self, index_name: &str) -> Self {
        self.index_name = index_name.to_string();
        self
    }

    #[must_use]
    pub fn field_index(mut self, field: &str, index_name: &str) -> Self {
        self.field_indexes
            .insert(field.to_string(), index_name.to_string());
        self
    }

    
    pub fn index_for(&self, field: &str) -> &str {
        self.field_indexes
            .get(field)
            .map(String::as_str)
            .unwrap_or(&self.index_name)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    #[serde(default = "default_identity_table")]
    pub identity_table: String,
    #[serde(default)]
    pub cascade: BTreeMap<String, TableConfig>,
    #[serde(default)]
    pub preserve: BTreeSet<String>,
    #[serde(default)]
    pub storage_fields: BTreeMap<String, Vec<String>>,
}

fn default_identity_table() -> String {
    crate::DEFAULT_IDENTITY_TABLE.to_string()
}

/// Declarative registry of what happens to every user reference on deletion.
///
/// Built once at startup and shared by reference. Lookups never fail: an
/// absent entry answers with `None` or the default, and spotting gaps is the
/// coverage verifier's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestFile", into = "ManifestFile")]
pub struct DeletionManifest {
    identity_table: String,
    cascade: BTreeMap<String, TableConfig>,
    preserve: BTreeSet<String>,
    storage_fields: BTreeMap<String, Vec<String>>,
}

impl DeletionManifest {
    pub fn new(
        identity_table: impl Into<String>,
        cascade: BTreeMap<String, TableConfig>,
        preserve: BTreeSet<String>,
        storage_fields: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let overlap: Vec<&String> = cascade.keys().filter(|t| preserve.contains(*t)).collect();
        if !overlap.is_empty() {
            return Err(ErasureError::configuration(format!(
                "tables registered as both cascade and preserve: {}",
                overlap
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if let Some((table, _)) = cascade.iter().find(|(_, config)| config.batch_size == 0) {
            return Err(ErasureError::configuration(format!(
                "batch size for {} must be positive",
                table
            )));
        }

        Ok(Self {
            identity_table: identity_table.into(),
            cascade,
            preserve,
            storage_fields,
        })
    }

    pub fn builder() -> ManifestBuilder {
        ManifestBuilder::default()
    }

    pub fn identity_table(&self) -> &str {
        &self.identity_table
    }

    pub fn cascade_tables(&self) -> Vec<&str> {
        self.cascade.keys().map(String::as_str).collect()
    }

    pub fn preserved_tables(&self) -> Vec<&str> {
        self.preserve.iter().map(String::as_str).collect()
    }

    pub fn table_config(&self, table: &str) -> Option<&TableConfig> {
        self.cascade.get(table)
    }

    pub fn field_strategy(&self, table: &str, field: &str) -> Option<Strategy> {
        self.cascade
            .get(table)
            .and_then(|config| config.fields.get(field))
            .copied()
    }

    pub fn is_preserved(&self, table: &str) -> bool {
        self.preserve.contains(table)
    }

    pub fn is_cascade(&self, table: &str) -> bool {
        self.cascade.contains_key(table)
    }

    pub fn storage_fields(&self, table: &str) -> &[String] {
        self.storage_fields
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn storage_tables(&self) -> Vec<&str> {
        self.storage_fields.keys().map(String::as_str).collect()
    }

    pub fn batch_size(&self, table: &str) -> usize {
        self.cascade
            .get(table)
            .map(|config| config.batch_size)
            .unwrap_or(crate::DEFAULT_BATCH_SIZE)
    }

    pub fn index_name(&self, table: &str) -> &str {
        self.cascade
            .get(table)
            .map(|config| config.index_name.as_str())
            .unwrap_or(crate::DEFAULT_INDEX_NAME)
    }

    
    pub fn index_for(&self, table: &str, field: &str) -> &str {
        self.cascade
            .get(table)
            .map(|config| config.index_for(field))
            .unwrap_or(crate::DEFAULT_INDEX_NAME)
    }
}

impl TryFrom<ManifestFile> for DeletionManifest {
    type Error = ErasureError;

    fn try_from(file: ManifestFile) -> Result<Self> {
        Self::new(file.identity_table, file.cascade, file.preserve, file.storage_fields)
    }
}

impl From<DeletionManifest> for ManifestFile {
    fn from(manifest: DeletionManifest) -> Self {
        Self {
            identity_table: manifest.identity_table,
            cascade: manifest.cascade,
            preserve: manifest.preserve,
            storage_fields: manifest.storage_fields,
        }
    }
}


pub struct ManifestBuilder {
    identity_table: String,
    cascade: BTreeMap<String, TableConfig>,
    preserve: BTreeSet<String>,
    storage_fields: BTreeMap<String, Vec<String>>,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self {
            identity_table: default_identity_table(),
            cascade: BTreeMap::new(),
            preserve: BTreeSet::new(),
            storage_fields: BTreeMap::new(),
        }
    }
}

impl ManifestBuilder {
    #[must_use]
    pub fn identity_table(mut self, table: &str) -> Self {
        self.identity_table = table.to_string();
        self
    }

    #[must_use]
    pub fn cascade(mut self, table: &str, config: TableConfig) -> Self {
        self.cascade.insert(table.to_string(), config);
        self
    }

    #[must_use]
    pub fn preserve(mut self, table: &str) -> Self {
        self.preserve.insert(table.to_string());
        self
    }

    #[must_use]
    pub fn storage(mut self, table: &str, fields: &[&str]) -> Self {
        self.storage_fields.insert(
            table.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn build(self) -> Result<DeletionManifest> {
        DeletionManifest::new(
            self.identity_table,
            self.cascade,
            self.preserve,
            self.storage_fields,
        )
    }
}
