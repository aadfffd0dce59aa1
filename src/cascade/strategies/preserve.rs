use tracing::debug;

use crate::cascade::models::ApplyOutcome;
use crate::db::Record;

/// Records an explicit keep-as-is decision. Never touches the store.
pub fn preserve_record(table: &str, field: &str, record: &Record) -> ApplyOutcome {
    debug!("Preserving {}.{} on {}", table, field, record.id);
    ApplyOutcome::Unchanged
}
