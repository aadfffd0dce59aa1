use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::audit::{AuditLogEntry, AuditSink, AuditStatus, CascadeSummary, JsonlAuditLog};
use super::identity::{ExternalIdentity, IdentityResolver, StoreIdentityResolver};
use super::models::{DeletionError, DeletionRequest, DeletionResult, DeletionState, ExternalOutcome};
use super::provider::{HttpIdentityProvider, IdentityProvider, ProviderResponse};
use crate::cascade::{CascadeExecutor, CascadeFailure};
use crate::core::config::ErasureConfig;
use crate::core::error::{ErasureError, Result};
use crate::core::events::{Event, EventBus, USER_DELETION_COMPLETED, USER_DELETION_FAILED};
use crate::db::DataStore;
use crate::manifest::DeletionManifest;

/// Coordinates one user deletion:
/// `INITIATED -> IDENTITY_RESOLVED -> DB_CASCADE_DONE -> EXTERNAL_ATTEMPTED -> AUDITED`.
///
/// Only identity resolution and the cascade are fatal. The identity provider
/// and the audit sink are surfaced in the result and never unwind the store.
/// The identity record is removed last, after the audit entry is written, so
/// an interrupted deletion can always be rerun.
pub struct DeletionOrchestrator {
    resolver: Arc<dyn IdentityResolver>,
    executor: CascadeExecutor,
    provider: Arc<dyn IdentityProvider>,
    audit: Arc<dyn AuditSink>,
    events: Option<Arc<EventBus>>,
    provider_timeout: Duration,
}

impl DeletionOrchestrator {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        executor: CascadeExecutor,
        provider: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            resolver,
            executor,
            provider,
            audit,
            events: None,
            provider_timeout: Duration::from_secs(crate::DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Production wiring: store-backed identity lookup, HTTP identity provider
    /// and a JSONL audit file. Fails when no audit log path is configured.
    pub fn from_config(
        config: &ErasureConfig,
        store: Arc<dyn DataStore>,
        manifest: Arc<DeletionManifest>,
    ) -> Result<Self> {
        let audit_path = config
            .audit_log_path
            .clone()
            .ok_or_else(|| ErasureError::configuration("audit_log_path is required"))?;

        let resolver = Arc::new(StoreIdentityResolver::new(
            store.clone(),
            manifest.identity_table(),
        ));
        let executor =
            CascadeExecutor::new(store, manifest).with_concurrency(config.batch_concurrency);
        let provider = Arc::new(HttpIdentityProvider::from_config(config)?);

        Ok(Self::new(resolver, executor, provider, Arc::new(JsonlAuditLog::new(audit_path)))
            .with_provider_timeout(config.provider_timeout()))
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn executor(&self) -> &CascadeExecutor {
        &self.executor
    }

    pub async fn delete_user(
        &self,
        request: &DeletionRequest,
    ) -> std::result::Result<DeletionResult, DeletionError> {
        let deletion_id = Uuid::new_v4();
        let user_id = request.target_user_id.as_str();
        info!(
            "Deletion {} {} for {} by {}",
            deletion_id,
            DeletionState::Initiated,
            user_id,
            request.actor_id
        );

        let handle = match self.resolver.resolve_external_handle(user_id).await {
            Ok(ExternalIdentity::Linked(handle)) => Some(handle),
            Ok(ExternalIdentity::Unlinked) => {
                info!("Deletion {}: {} has no provider account", deletion_id, user_id);
                None
            }
            Ok(ExternalIdentity::Missing) => {
                warn!("Deletion {} aborted: no identity for {}", deletion_id, user_id);
                return Err(DeletionError::IdentityNotFound(user_id.to_string()));
            }
            Err(e) => {
                error!("Deletion {} aborted: identity lookup failed: {}", deletion_id, e);
                return Err(DeletionError::IdentityLookup {
                    user_id: user_id.to_string(),
                    message: e.to_string(),
                });
            }
        };
        info!("Deletion {} {}", deletion_id, DeletionState::IdentityResolved);

        let cascade = match self
            .executor
            .run(user_id, request.new_owner_id.as_deref())
            .await
        {
            Ok(report) => report,
            Err(failure) => {
                self.record_cascade_failure(deletion_id, request, handle.as_deref(), &failure)
                    .await;
                return Err(DeletionError::CascadeFailed {
                    user_id: user_id.to_string(),
                    failure: Box::new(failure),
                });
            }
        };

        let mut result = DeletionResult::new(deletion_id, handle.as_deref(), cascade);
        info!("Deletion {} {}", deletion_id, result.state);

        let external = match handle.as_deref() {
            Some(handle) => self.delete_external(handle).await,
            None => ExternalOutcome::NotAttempted,
        };
        result.record_external(&external);
        result.state = DeletionState::ExternalAttempted;
        info!("Deletion {} {}: {:?}", deletion_id, result.state, external);

        let status = if external.error().is_none() {
            AuditStatus::Completed
        } else {
            AuditStatus::CompletedWithWarnings
        };
        let entry = self.audit_entry(
            deletion_id,
            request,
            handle.as_deref(),
            status,
            CascadeSummary::from(&result.cascade),
            external,
            None,
        );

        match self.audit.append(&entry).await {
            Ok(()) => result.state = DeletionState::Audited,
            Err(e) => {
                warn!("Deletion {} audit write failed (non-fatal): {}", deletion_id, e);
                result.audit_error = Some(e.to_string());
            }
        }

        // The identity record holds the external handle; it goes only once the
        // attempt is on the audit trail, so an interrupted deletion can rerun.
        if result.state == DeletionState::Audited {
            match self.executor.delete_identity(user_id).await {
                Ok(()) => result.identity_deleted = true,
                Err(e) => result.identity_error = Some(e.to_string()),
            }
        }

        self.emit(
            Event::new(
                USER_DELETION_COMPLETED,
                json!({
                    "userId": user_id,
                    "externalDeleted": result.external_deleted,
                    "recordsDeleted": result.records_deleted,
                    "filesDeleted": result.files_deleted,
                }),
            )
            .with_correlation(deletion_id),
        )
        .await;

        for warning in result.warnings() {
            warn!("Deletion {} needs follow-up: {}", deletion_id, warning);
        }
        info!(
            "Deletion {} finished in state {} (clean: {})",
            deletion_id,
            result.state,
            result.is_clean()
        );
        Ok(result)
    }

    async fn delete_external(&self, handle: &str) -> ExternalOutcome {
        let call = self.provider.delete_account(handle);
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(ProviderResponse::Ok) => ExternalOutcome::Deleted,
            Ok(ProviderResponse::NotFound) => ExternalOutcome::AlreadyDeleted,
            Ok(ProviderResponse::Error(message)) => ExternalOutcome::Failed(message),
            Err(_) => ExternalOutcome::Failed(format!(
                "{} provider timed out after {:?}",
                self.provider.provider_name(),
                self.provider_timeout
            )),
        }
    }

    async fn record_cascade_failure(
        &self,
        deletion_id: Uuid,
        request: &DeletionRequest,
        handle: Option<&str>,
        failure: &CascadeFailure,
    ) {
        error!(
            "Deletion {} aborted during cascade: {}",
            deletion_id, failure.error
        );

        let entry = self.audit_entry(
            deletion_id,
            request,
            handle,
            AuditStatus::CascadeFailed,
            CascadeSummary::from(&failure.partial),
            ExternalOutcome::NotAttempted,
            Some(failure.error.to_string()),
        );
        if let Err(e) = self.audit.append(&entry).await {
            warn!("Deletion {} audit write failed (non-fatal): {}", deletion_id, e);
        }

        self.emit(
            Event::new(
                USER_DELETION_FAILED,
                json!({
                    "userId": request.target_user_id,
                    "error": failure.error.to_string(),
                }),
            )
            .with_correlation(deletion_id),
        )
        .await;
    }

    #[allow(clippy::too_many_arguments)]
    fn audit_entry(
        &self,
        deletion_id: Uuid,
        request: &DeletionRequest,
        handle: Option<&str>,
        status: AuditStatus,
        cascade: CascadeSummary,
        external: ExternalOutcome,
        error: Option<String>,
    ) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            deletion_id,
            actor_id: request.actor_id.clone(),
            target_user_id: request.target_user_id.clone(),
            external_handle: handle.map(str::to_string),
            reason: request.reason.clone(),
            timestamp: Utc::now(),
            status,
            cascade,
            external,
            error,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeError;
    use crate::db::{MemoryStore, Record};
    use crate::manifest::{DeletionManifest, Strategy, TableConfig};
    use crate::orchestrator::audit::MemoryAuditLog;
    use crate::orchestrator::identity::StoreIdentityResolver;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        response: ProviderResponse,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(response: ProviderResponse) -> Self {
            Self {
                response,
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        async fn delete_account(&self, external_handle: &str) -> ProviderResponse {
            self.calls.lock().push(external_handle.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response.clone()
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    fn manifest() -> Arc<DeletionManifest> {
        Arc::new(
            DeletionManifest::builder()
                .cascade("notes", TableConfig::new().field("authorId", Strategy::Delete))
                .cascade("comments", TableConfig::new().field("authorId", Strategy::Anonymize))
                .cascade("projects", TableConfig::new().field("ownerId", Strategy::Reassign))
                .preserve("deletionAuditLog")
                .storage("notes", &["fileId"])
                .build()
                .unwrap(),
        )
    }

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new()
            .with_index("notes", "by_user", "authorId")
            .with_index("comments", "by_user", "authorId")
            .with_index("projects", "by_user", "ownerId");

        store.insert("users", Record::new("u1").with("externalId", "ext_1").with("email", "u1@example.com"));
        store.insert("users", Record::new("u2").with("externalId", "ext_2"));
        store.put_blob("blob_a");
        store.insert("notes", Record::new("n1").with("authorId", "u1").with("fileId", "blob_a"));
        store.insert("notes", Record::new("n2").with("authorId", "u1"));
        store.insert("notes", Record::new("n3").with("authorId", "u2"));
        store.insert(
            "comments",
            Record::new("c1").with("authorId", "u1").with("email", "u1@example.com"),
        );
        store.insert("projects", Record::new("p1").with("ownerId", "u1"));
        Arc::new(store)
    }

    fn orchestrator(
        store: &Arc<MemoryStore>,
        provider: Arc<ScriptedProvider>,
        audit: Arc<MemoryAuditLog>,
    ) -> DeletionOrchestrator {
        let executor = CascadeExecutor::new(store.clone(), manifest());
        let resolver = Arc::new(StoreIdentityResolver::new(store.clone(), "users"));
        DeletionOrchestrator::new(resolver, executor, provider, audit)
    }

    fn request() -> DeletionRequest {
        DeletionRequest::new("u1", "admin", "user request").with_new_owner("u2")
    }

    #[tokio::test]
    async fn test_end_to_end_deletion() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());
        let orchestrator = orchestrator(&store, provider.clone(), audit.clone());

        let result = orchestrator.delete_user(&request()).await.unwrap();

        assert_eq!(result.state, DeletionState::Audited);
        assert!(result.is_clean());
        assert!(result.external_deleted);
        assert_eq!(result.tables_processed, 3);
        assert_eq!(result.records_deleted, 2);
        assert_eq!(result.records_anonymized, 1);
        assert_eq!(result.records_reassigned, 1);
        assert_eq!(result.files_deleted, 1);

        assert_eq!(store.count_references("notes", "authorId", "u1"), 0);
        assert_eq!(store.records("notes").len(), 1);
        assert!(!store.has_blob("blob_a"));

        let comment = store.record("comments", "c1").unwrap();
        assert_eq!(comment.get_str("authorId"), Some(crate::DELETED_USER_SENTINEL));
        assert_eq!(comment.get_str("email"), Some(crate::REDACTED));

        let project = store.record("projects", "p1").unwrap();
        assert_eq!(project.get_str("ownerId"), Some("u2"));
        assert_eq!(project.get_str("previousOwner"), Some("u1"));

        for (table, field) in [("notes", "authorId"), ("comments", "authorId"), ("projects", "ownerId")] {
            assert_eq!(store.count_references(table, field, "u1"), 0);
        }
        assert!(store.record("users", "u1").is_none());

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::Completed);
        assert_eq!(entries[0].actor_id, "admin");
        assert_eq!(entries[0].deletion_id, result.deletion_id);
        assert_eq!(provider.calls(), vec!["ext_1".to_string()]);
    }

    #[tokio::test]
    async fn test_external_not_found_counts_as_deleted() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::NotFound));
        let audit = Arc::new(MemoryAuditLog::new());

        let result = orchestrator(&store, provider, audit.clone())
            .delete_user(&request())
            .await
            .unwrap();

        assert!(result.external_deleted);
        assert!(result.external_error.is_none());
        assert_eq!(audit.entries()[0].external, ExternalOutcome::AlreadyDeleted);
    }

    #[tokio::test]
    async fn test_external_failure_is_soft() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Error("HTTP 503".into())));
        let audit = Arc::new(MemoryAuditLog::new());

        let result = orchestrator(&store, provider, audit.clone())
            .delete_user(&request())
            .await
            .unwrap();

        assert_eq!(result.state, DeletionState::Audited);
        assert!(!result.external_deleted);
        assert_eq!(result.external_error.as_deref(), Some("HTTP 503"));
        assert!(!result.is_clean());
        assert_eq!(store.count_references("notes", "authorId", "u1"), 0);
        assert_eq!(audit.entries()[0].status, AuditStatus::CompletedWithWarnings);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_soft() {
        let store = store();
        let provider = Arc::new(
            ScriptedProvider::new(ProviderResponse::Ok).slow(Duration::from_millis(500)),
        );
        let audit = Arc::new(MemoryAuditLog::new());

        let result = orchestrator(&store, provider, audit)
            .with_provider_timeout(Duration::from_millis(20))
            .delete_user(&request())
            .await
            .unwrap();

        assert!(!result.external_deleted);
        assert!(result.external_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_identity_aborts_before_mutation() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());

        let err = orchestrator(&store, provider.clone(), audit.clone())
            .delete_user(&DeletionRequest::new("ghost", "admin", "cleanup"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeletionError::IdentityNotFound(ref id) if id == "ghost"));
        assert_eq!(store.records("notes").len(), 3);
        assert!(provider.calls().is_empty());
        assert!(audit.entries().is_empty());
    }

    #[tokio::test]
    async fn test_cascade_failure_skips_provider_and_is_audited() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());

        let err = orchestrator(&store, provider.clone(), audit.clone())
            .delete_user(&DeletionRequest::new("u1", "admin", "no owner given"))
            .await
            .unwrap_err();

        match err {
            DeletionError::CascadeFailed { failure, .. } => {
                assert!(matches!(failure.error, CascadeError::Precondition { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(provider.calls().is_empty());
        assert_eq!(store.records("notes").len(), 3);

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::CascadeFailed);
        assert_eq!(entries[0].external, ExternalOutcome::NotAttempted);
        assert!(entries[0].error.is_some());
    }

    #[tokio::test]
    async fn test_audit_failure_is_non_fatal_and_keeps_identity() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());
        audit.set_failing(true);
        let orchestrator = orchestrator(&store, provider.clone(), audit.clone());

        let result = orchestrator.delete_user(&request()).await.unwrap();

        assert_eq!(result.state, DeletionState::ExternalAttempted);
        assert!(result.audit_error.is_some());
        assert!(result.external_deleted);
        assert!(!result.identity_deleted);
        assert_eq!(store.count_references("notes", "authorId", "u1"), 0);
        assert!(store.record("users", "u1").is_some());

        audit.set_failing(false);
        let retried = orchestrator.delete_user(&request()).await.unwrap();
        assert!(retried.is_clean());
        assert_eq!(audit.entries().len(), 1);
        assert_eq!(provider.calls().len(), 2);
        assert!(store.record("users", "u1").is_none());
    }

    #[tokio::test]
    async fn test_resumes_after_interrupted_cascade() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());
        let orchestrator = orchestrator(&store, provider.clone(), audit.clone());

        orchestrator.executor().run("u1", Some("u2")).await.unwrap();

        let result = orchestrator.delete_user(&request()).await.unwrap();

        assert_eq!(result.state, DeletionState::Audited);
        assert!(result.is_clean());
        assert_eq!(result.records_deleted, 0);
        assert_eq!(result.external_handle.as_deref(), Some("ext_1"));
        assert_eq!(provider.calls(), vec!["ext_1".to_string()]);
        assert_eq!(audit.entries().len(), 1);
        assert!(store.record("users", "u1").is_none());
    }

    #[tokio::test]
    async fn test_user_without_provider_account_is_still_deleted() {
        let store = store();
        store.insert("users", Record::new("u3").with("email", "invited@example.com"));
        store.insert("notes", Record::new("n4").with("authorId", "u3"));
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());

        let result = orchestrator(&store, provider.clone(), audit.clone())
            .delete_user(&DeletionRequest::new("u3", "admin", "invite expired"))
            .await
            .unwrap();

        assert_eq!(result.state, DeletionState::Audited);
        assert!(result.external_handle.is_none());
        assert!(!result.external_deleted);
        assert!(result.external_error.is_none());
        assert!(result.identity_deleted);
        assert_eq!(store.count_references("notes", "authorId", "u3"), 0);
        assert!(store.record("users", "u3").is_none());
        assert!(provider.calls().is_empty());

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, AuditStatus::Completed);
        assert_eq!(entries[0].external, ExternalOutcome::NotAttempted);
        assert!(entries[0].external_handle.is_none());
    }

    #[test]
    fn test_from_config_requires_audit_path() {
        let store: Arc<dyn DataStore> = store();
        let mut config = ErasureConfig::default();
        assert!(matches!(
            DeletionOrchestrator::from_config(&config, store.clone(), manifest()),
            Err(ErasureError::Configuration(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        config.audit_log_path = Some(dir.path().join("audit.jsonl"));
        config.batch_concurrency = 2;
        let orchestrator = DeletionOrchestrator::from_config(&config, store, manifest()).unwrap();
        assert_eq!(orchestrator.provider_timeout, config.provider_timeout());
        assert_eq!(orchestrator.executor().manifest().identity_table(), "users");
    }

    #[tokio::test]
    async fn test_completion_event_is_emitted() {
        let store = store();
        let provider = Arc::new(ScriptedProvider::new(ProviderResponse::Ok));
        let audit = Arc::new(MemoryAuditLog::new());
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        bus.register(
            USER_DELETION_COMPLETED,
            Arc::new(move |event: Event| {
                assert_eq!(event.payload["userId"], "u1");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;

        orchestrator(&store, provider, audit)
            .with_events(bus)
            .delete_user(&request())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
