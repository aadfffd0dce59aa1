pub mod anonymize;
pub mod delete;
pub mod preserve;
pub mod reassign;

pub use anonymize::{anonymize_record, PII_FIELDS};
pub use delete::delete_record;
pub use preserve::preserve_record;
pub use reassign::reassign_record;

use crate::cascade::models::{ApplyError, ApplyOutcome};
use crate::db::{DataStore, Record};
use crate::manifest::Strategy;

/// Dispatches one document to the applier for `strategy`.
pub async fn apply_strategy(
    store: &dyn DataStore,
    strategy: Strategy,
    table: &str,
    field: &str,
    record: &Record,
    new_owner_id: Option<&str>,
    cleared_fields: &[String],
) -> Result<ApplyOutcome, ApplyError> {
    match strategy {
        Strategy::Delete => delete_record(store, table, record).await,
        Strategy::Anonymize => anonymize_record(store, table, field, record, cleared_fields).await,
        Strategy::Reassign => reassign_record(store, table, field, record, new_owner_id).await,
        Strategy::Preserve => Ok(preserve_record(table, field, record)),
    }
}
