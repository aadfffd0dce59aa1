use std::path::Path;

use tracing::{debug, info};

use super::models::SchemaDescription;
use crate::core::error::{ErasureError, Result};

impl SchemaDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!("Loading schema description from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ErasureError::configuration(format!(
                "cannot read schema description {}: {}",
                path.display(),
                e
            ))
        })?;
        let schema = Self::from_json(&content)?;

        info!("Loaded schema description with {} tables", schema.tables.len());
        Ok(schema)
    }
}
