use std::collections::HashMap;

use async_trait::async_trait;

/// Chooses who inherits documents whose owner is being deleted.
/// `None` means no policy applies to that table and field.
#[async_trait]
pub trait ReassignPolicy: Send + Sync {
    async fn resolve_new_owner(&self, table: &str, field: &str, deleted_user: &str)
    -> Option<String>;
}


pub struct NoReassignPolicy;

#[async_trait]
impl ReassignPolicy for NoReassignPolicy {
    async fn resolve_new_owner(&self, _table: &str, _field: &str, _deleted_user: &str) -> Option<String> {
        None
    }
}


pub struct StaticOwnerPolicy {
    default_owner: Option<String>,
    per_table: HashMap<String, String>,
}

impl StaticOwnerPolicy {
    pub fn new(default_owner: Option<&str>) -> Self {
        Self {
            default_owner: default_owner.map(str::to_string),
            per_table: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: &str, owner: &str) -> Self {
        self.per_table.insert(table.to_string(), owner.to_string());
        self
    }
}

#[async_trait]
impl ReassignPolicy for StaticOwnerPolicy {
    async fn resolve_new_owner(&self, table: &str, _field: &str, deleted_user: &str) -> Option<String> {
        let eligible = |owner: &&String| owner.as_str() != deleted_user;
        self.per_table
            .get(table)
            .filter(eligible)
            .or_else(|| self.default_owner.as_ref().filter(eligible))
            .cloned()
    }
}
