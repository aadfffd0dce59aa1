use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::db::{DataStore, StoreError};


pub const EXTERNAL_ID_FIELD: &str = "externalId";

/// What the identity registry knows about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalIdentity {
    /// No identity record for the user.
    Missing,
    /// The user exists but never got a provider account, e.g. an invite that
    /// was never accepted.
    Unlinked,
    Linked(String),
}

impl ExternalIdentity {
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Linked(handle) => Some(handle.as_str()),
            _ => None,
        }
    }
}

/// The one lookup from an internal user id to the identity provider's
/// handle. Nothing else in the crate knows how that handle is stored.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_external_handle(&self, user_id: &str) -> Result<ExternalIdentity, StoreError>;
}


pub struct StoreIdentityResolver {
    store: Arc<dyn DataStore>,
    identity_table: String,
    handle_field: String,
}

impl StoreIdentityResolver {
    pub fn new(store: Arc<dyn DataStore>, identity_table: &str) -> Self {
        Self {
            store,
            identity_table: identity_table.to_string(),
            handle_field: EXTERNAL_ID_FIELD.to_string(),
        }
    }

    #[must_use]
    pub fn with_handle_field(mut self, field: &str) -> Self {
        self.handle_field = field.to_string();
        self
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn resolve_external_handle(&self, user_id: &str) -> Result<ExternalIdentity, StoreError> {
        let Some(record) = self.store.get(&self.identity_table, user_id).await? else {
            debug!("No identity {}/{}", self.identity_table, user_id);
            return Ok(ExternalIdentity::Missing);
        };

        let identity = match record.get_str(&self.handle_field) {
            Some(handle) if !handle.is_empty() => ExternalIdentity::Linked(handle.to_string()),
            _ => ExternalIdentity::Unlinked,
        };
        debug!(
            "Resolved {}/{}: external handle present: {}",
            self.identity_table,
            user_id,
            identity.handle().is_some()
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, Record};

    #[tokio::test]
    async fn test_resolves_external_handle() {
        let store = Arc::new(MemoryStore::new());
        store.insert("users", Record::new("u1").with("externalId", "user_2abc"));
        store.insert("users", Record::new("u2").with("externalId", ""));
        store.insert("users", Record::new("u3").with("email", "invited@example.com"));
        let resolver = StoreIdentityResolver::new(store, "users");

        assert_eq!(
            resolver.resolve_external_handle("u1").await.unwrap(),
            ExternalIdentity::Linked("user_2abc".to_string())
        );
        assert_eq!(
            resolver.resolve_external_handle("u2").await.unwrap(),
            ExternalIdentity::Unlinked
        );
        assert_eq!(
            resolver.resolve_external_handle("u3").await.unwrap(),
            ExternalIdentity::Unlinked
        );
        assert_eq!(
            resolver.resolve_external_handle("ghost").await.unwrap(),
            ExternalIdentity::Missing
        );
    }
}
