pub mod audit;
pub mod identity;
pub mod models;
pub mod provider;
pub mod saga;

pub use audit::{AuditError, AuditLogEntry, AuditSink, AuditStatus, CascadeSummary, JsonlAuditLog, MemoryAuditLog};
pub use identity::{ExternalIdentity, IdentityResolver, StoreIdentityResolver, EXTERNAL_ID_FIELD};
pub use models::{DeletionError, DeletionRequest, DeletionResult, DeletionState, ExternalOutcome};
pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderResponse};
pub use saga::DeletionOrchestrator;
