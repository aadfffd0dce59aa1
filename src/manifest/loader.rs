use std::path::Path;

use tracing::{debug, info};

use super::models::DeletionManifest;
use crate::core::error::{ErasureError, Result};

impl DeletionManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!("Loading deletion manifest from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            ErasureError::configuration(format!(
                "cannot read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        let manifest = Self::from_json(&content)?;

        info!(
            "Loaded manifest: {} cascade tables, {} preserved",
            manifest.cascade_tables().len(),
            manifest.preserved_tables().len()
        );
        Ok(manifest)
    }
}
