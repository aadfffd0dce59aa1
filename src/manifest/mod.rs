pub mod loader;
pub mod models;
pub mod registry;

pub use models::{DeletionManifest, ManifestBuilder, ManifestFile, Strategy, TableConfig};
pub use registry::{application_manifest, ACTIVITY_LOG_TABLE, AUDIT_LOG_TABLE};
