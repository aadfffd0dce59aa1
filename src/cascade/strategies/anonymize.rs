use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cascade::models::{ApplyError, ApplyOutcome};
use crate::db::{DataStore, Patch, Record};


pub const ANONYMIZED_AT_FIELD: &str = "anonymizedAt";

pub const ANONYMIZATION_REASON_FIELD: &str = "anonymizationReason";

pub const ANONYMIZATION_REASON: &str = "user_deleted";

/// PII-shaped fields blanked on anonymization when a document carries them.
pub const PII_FIELDS: &[&str] = &[
    "email",
    "name",
    "firstName",
    "lastName",
    "fullName",
    "displayName",
    "phone",
    "phoneNumber",
    "address",
    "street",
    "city",
    "postalCode",
    "ipAddress",
    "userAgent",
];

/// Swaps the identity reference in `field` for the deleted-user sentinel and
/// redacts every PII field present on the document. Everything else,
/// including thread and audit linkage, is left alone.
///
/// `cleared_fields` (blob references already swept) are nulled in the same
/// patch, so the document sees exactly one write.
pub async fn anonymize_record(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    record: &Record,
    cleared_fields: &[String],
) -> Result<ApplyOutcome, ApplyError> {
    let mut patch = Patch::new();
    for cleared in cleared_fields {
        patch.insert(cleared.clone(), Value::Null);
    }

    if record.references(field, crate::DELETED_USER_SENTINEL) {
        if patch.is_empty() {
            debug!("{}/{} already anonymized", table, record.id);
            return Ok(ApplyOutcome::Unchanged);
        }
        return write(store, table, field, record, patch).await;
    }

    patch.insert(
        field.to_string(),
        Value::String(crate::DELETED_USER_SENTINEL.to_string()),
    );
    for pii in PII_FIELDS {
        if record.get(pii).is_some() {
            patch.insert(pii.to_string(), Value::String(crate::REDACTED.to_string()));
        }
    }
    patch.insert(
        ANONYMIZED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    patch.insert(
        ANONYMIZATION_REASON_FIELD.to_string(),
        Value::String(ANONYMIZATION_REASON.to_string()),
    );

    write(store, table, field, record, patch).await
}

async fn write(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    record: &Record,
    patch: Patch,
) -> Result<ApplyOutcome, ApplyError> {
    match store.patch(table, &record.id, patch).await {
        Ok(()) => {
            debug!("Anonymized {}.{} on {}", table, field, record.id);
            Ok(ApplyOutcome::Applied)
        }
        Err(e) if e.is_not_found() => {
            debug!("{}/{} vanished before anonymization", table, record.id);
            Ok(ApplyOutcome::Unchanged)
        }
        Err(e) => {
            warn!("Failed to anonymize {}/{}: {}", table, record.id, e);
            Err(ApplyError::store(&record.id, e))
        }
    }
}
