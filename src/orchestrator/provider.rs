use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::ErasureConfig;
use crate::core::error::{ErasureError, Result};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    Ok,
    NotFound,
    Error(String),
}

/// External identity provider holding the login account.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn delete_account(&self, external_handle: &str) -> ProviderResponse;

    fn provider_name(&self) -> &str;
}


pub struct HttpIdentityProvider {
    base_url: Url,
    secret: Option<String>,
    client: Client,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url).map_err(|e| {
            ErasureError::configuration(format!("invalid identity provider URL {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ErasureError::configuration(format!(
                "identity provider URL {} cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ErasureError::configuration(format!("cannot build HTTP client: {}", e)))?;

        info!("Identity provider client initialized (url={})", base_url);
        Ok(Self {
            base_url,
            secret,
            client,
        })
    }

    pub fn from_config(config: &ErasureConfig) -> Result<Self> {
        Self::new(
            config.identity_provider_url.clone(),
            config.identity_provider_secret.clone(),
            config.provider_timeout(),
        )
    }

    /// `{base}/v1/users/{handle}` with the handle as one percent-encoded path
    /// segment. Handles that cannot name a single account are rejected.
    pub fn account_url(&self, external_handle: &str) -> std::result::Result<Url, String> {
        if matches!(external_handle.trim(), "" | "." | "..") {
            return Err(format!("invalid external handle {:?}", external_handle));
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["v1", "users", external_handle]);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn delete_account(&self, external_handle: &str) -> ProviderResponse {
        let url = match self.account_url(external_handle) {
            Ok(url) => url,
            Err(message) => {
                warn!("Refusing provider call: {}", message);
                return ProviderResponse::Error(message);
            }
        };

        let mut request = self.client.delete(url);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                debug!("Account {} not found at provider", external_handle);
                ProviderResponse::NotFound
            }
            Ok(response) if response.status().is_success() => ProviderResponse::Ok,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Provider rejected deletion of {}: HTTP {}", external_handle, status);
                ProviderResponse::Error(format!("HTTP {}: {}", status, body))
            }
            Err(e) => {
                warn!("Provider request for {} failed: {}", external_handle, e);
                ProviderResponse::Error(e.to_string())
            }
        }
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
