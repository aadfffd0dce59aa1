use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Result;


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErasureConfig {
    
    pub identity_provider_url: String,
    pub identity_provider_secret: Option<String>,
    pub identity_provider_timeout_secs: u64,

    
    pub batch_concurrency: usize,

    
    pub audit_log_path: Option<PathBuf>,

    
    pub manifest_path: PathBuf,
    pub schema_path: PathBuf,
}

impl ErasureConfig {
    
    pub fn new(identity_provider_url: &str) -> Self {
        Self {
            identity_provider_url: identity_provider_url.to_string(),
            identity_provider_secret: None,
            identity_provider_timeout_secs: crate::DEFAULT_PROVIDER_TIMEOUT_SECS,

            batch_concurrency: crate::DEFAULT_BATCH_CONCURRENCY,

            audit_log_path: None,

            manifest_path: PathBuf::from("fixtures/manifest.json"),
            schema_path: PathBuf::from("fixtures/schema.json"),
        }
    }

    /// Layers defaults, an optional config file and `ERASURE_*` environment
    /// variables, later sources winning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("ERASURE").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize::<Self>()?)
    }

    
    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("ERASURE_IDENTITY_PROVIDER_URL")
                .unwrap_or_else(|_| crate::DEFAULT_IDENTITY_PROVIDER_URL.to_string()),
        );

        if let Ok(secret) = std::env::var("ERASURE_IDENTITY_PROVIDER_SECRET") {
            config.identity_provider_secret = Some(secret);
        }
        if let Some(timeout) = std::env::var("ERASURE_IDENTITY_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
        {
            config.identity_provider_timeout_secs = timeout;
        }
        if let Some(concurrency) = std::env::var("ERASURE_BATCH_CONCURRENCY")
            .ok()
            .and_then(|c| c.parse().ok())
        {
            config.batch_concurrency = concurrency;
        }
        if let Ok(path) = std::env::var("ERASURE_AUDIT_LOG_PATH") {
            config.audit_log_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("ERASURE_MANIFEST_PATH") {
            config.manifest_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("ERASURE_SCHEMA_PATH") {
            config.schema_path = PathBuf::from(path);
        }

        config
    }

    
    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.identity_provider_timeout_secs)
    }
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self::new(crate::DEFAULT_IDENTITY_PROVIDER_URL)
    }
}
