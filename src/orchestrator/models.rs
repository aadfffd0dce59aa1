use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

use crate::cascade::{CascadeError, CascadeFailure, CascadeReport};
use crate::core::error::ErasureError;

/// Saga states, in order. `Audited` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionState {
    Initiated,
    IdentityResolved,
    DbCascadeDone,
    ExternalAttempted,
    Audited,
}

impl DeletionState {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initiated => Some(Self::IdentityResolved),
            Self::IdentityResolved => Some(Self::DbCascadeDone),
            Self::DbCascadeDone => Some(Self::ExternalAttempted),
            Self::ExternalAttempted => Some(Self::Audited),
            Self::Audited => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub target_user_id: String,
    pub actor_id: String,
    pub reason: String,
    /// Inherits reassign-strategy documents; falls back to the executor's
    /// reassignment policy when absent.
    pub new_owner_id: Option<String>,
}

impl DeletionRequest {
    pub fn new(target_user_id: &str, actor_id: &str, reason: &str) -> Self {
        Self {
            target_user_id: target_user_id.to_string(),
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
            new_owner_id: None,
        }
    }

    #[must_use]
    pub fn with_new_owner(mut self, new_owner_id: &str) -> Self {
        self.new_owner_id = Some(new_owner_id.to_string());
        self
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ExternalOutcome {
    Deleted,
    AlreadyDeleted,
    Failed(String),
    NotAttempted,
}

impl ExternalOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted | Self::AlreadyDeleted)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// What one deletion achieved. Returned even when later steps failed, so
/// inspect the individual outcome fields rather than assuming all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub deletion_id: Uuid,
    pub user_id: String,
    /// `None` for users that never had a provider account.
    pub external_handle: Option<String>,
    pub state: DeletionState,
    pub tables_processed: usize,
    pub records_deleted: usize,
    pub records_anonymized: usize,
    pub records_reassigned: usize,
    pub files_deleted: usize,
    pub external_deleted: bool,
    pub external_error: Option<String>,
    pub audit_error: Option<String>,
    pub identity_deleted: bool,
    pub identity_error: Option<String>,
    pub cascade: CascadeReport,
}

impl DeletionResult {
    pub fn new(deletion_id: Uuid, external_handle: Option<&str>, cascade: CascadeReport) -> Self {
        Self {
            deletion_id,
            user_id: cascade.user_id.clone(),
            external_handle: external_handle.map(str::to_string),
            state: DeletionState::DbCascadeDone,
            tables_processed: cascade.tables_processed(),
            records_deleted: cascade.records_deleted(),
            records_anonymized: cascade.records_anonymized(),
            records_reassigned: cascade.records_reassigned(),
            files_deleted: cascade.files_deleted(),
            external_deleted: false,
            external_error: None,
            audit_error: None,
            identity_deleted: false,
            identity_error: None,
            cascade,
        }
    }

    pub fn record_external(&mut self, outcome: &ExternalOutcome) {
        self.external_deleted = outcome.is_deleted();
        self.external_error = outcome.error().map(str::to_string);
    }

    /// Soft errors from the external and audit steps, in the crate taxonomy.
    pub fn warnings(&self) -> Vec<ErasureError> {
        let mut warnings = Vec::new();
        if let Some(message) = &self.external_error {
            warnings.push(ErasureError::ExternalService(message.clone()));
        }
        if let Some(message) = &self.audit_error {
            warnings.push(ErasureError::Audit(message.clone()));
        }
        if let Some(message) = &self.identity_error {
            warnings.push(ErasureError::Store(message.clone()));
        }
        warnings
    }

    /// True when every step succeeded, soft errors included.
    pub fn is_clean(&self) -> bool {
        self.state == DeletionState::Audited
            && self.external_error.is_none()
            && self.audit_error.is_none()
            && self.identity_deleted
    }
}


#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),
    #[error("Identity lookup failed for {user_id}: {message}")]
    IdentityLookup { user_id: String, message: String },
    #[error("Cascade failed for {user_id}: {failure}")]
    CascadeFailed {
        user_id: String,
        failure: Box<CascadeFailure>,
    },
}

impl From<DeletionError> for ErasureError {
    fn from(error: DeletionError) -> Self {
        match error {
            DeletionError::IdentityNotFound(user_id) => ErasureError::NotFound(user_id),
            DeletionError::IdentityLookup { message, .. } => ErasureError::Store(message),
            DeletionError::CascadeFailed { failure, .. } => match failure.error {
                CascadeError::Precondition { .. } => ErasureError::Precondition(failure.to_string()),
                _ => ErasureError::Store(failure.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_order() {
        let mut state = DeletionState::Initiated;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            visited.push(state);
        }
        assert_eq!(visited.len(), 5);
        assert!(state.is_terminal());
        assert_eq!(DeletionState::DbCascadeDone.to_string(), "DB_CASCADE_DONE");
    }

    #[test]
    fn test_external_outcome_mapping() {
        let mut result = DeletionResult::new(Uuid::new_v4(), Some("ext_1"), CascadeReport::new("u1"));

        result.record_external(&ExternalOutcome::AlreadyDeleted);
        assert!(result.external_deleted);
        assert!(result.external_error.is_none());

        result.record_external(&ExternalOutcome::Failed("HTTP 503".to_string()));
        assert!(!result.external_deleted);
        assert_eq!(result.external_error.as_deref(), Some("HTTP 503"));

        result.audit_error = Some("disk full".to_string());
        let warnings = result.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(ErasureError::is_recoverable));
        assert!(matches!(warnings[0], ErasureError::ExternalService(_)));
    }

    #[test]
    fn test_deletion_error_maps_into_taxonomy() {
        let err: ErasureError = DeletionError::IdentityNotFound("u1".into()).into();
        assert!(matches!(err, ErasureError::NotFound(_)));

        let failure = CascadeFailure {
            error: CascadeError::Precondition {
                table: "projects".into(),
                field: "ownerId".into(),
                message: "no owner".into(),
            },
            partial: CascadeReport::new("u1"),
        };
        let err: ErasureError = DeletionError::CascadeFailed {
            user_id: "u1".into(),
            failure: Box::new(failure),
        }
        .into();
        assert!(matches!(err, ErasureError::Precondition(_)));
    }
}
