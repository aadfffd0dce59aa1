pub mod cascade;
pub mod core;
pub mod db;
pub mod manifest;
pub mod orchestrator;
pub mod schema;
pub mod verifier;


pub use cascade::{CascadeExecutor, CascadeReport};
pub use core::config::ErasureConfig;
pub use core::error::{ErasureError, Result};
pub use db::{DataStore, MemoryStore, Record};
pub use manifest::{application_manifest, DeletionManifest, Strategy, TableConfig};
pub use orchestrator::{DeletionOrchestrator, DeletionRequest, DeletionResult};
pub use schema::SchemaDescription;
pub use verifier::{CoverageReport, CoverageVerifier};


pub const DEFAULT_BATCH_SIZE: usize = 200;


pub const DEFAULT_INDEX_NAME: &str = "by_user";


pub const DEFAULT_IDENTITY_TABLE: &str = "users";

/// Written over an anonymized identity reference.
pub const DELETED_USER_SENTINEL: &str = "deleted-user";

/// Written over anonymized personal data.
pub const REDACTED: &str = "[REDACTED]";


pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;


pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;


pub const DEFAULT_IDENTITY_PROVIDER_URL: &str = "http://localhost:8787";
