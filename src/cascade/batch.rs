use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::models::{ApplyError, ApplyOutcome, BatchOutcome, ItemFailure};
use super::strategies::apply_strategy;
use super::sweep::{sweep_record, SweepOutcome};
use crate::db::{DataStore, Record};
use crate::manifest::Strategy;

/// One batch of documents matched through a single identity field.
pub struct BatchTarget<'a> {
    pub table: &'a str,
    pub field: &'a str,
    pub strategy: Strategy,
    pub records: &'a [Record],
    /// Blob fields swept before delete or anonymize.
    pub storage_fields: &'a [String],
    pub new_owner_id: Option<&'a str>,
}

/// Applies `target.strategy` to every record with fail-resume semantics.
///
/// Preconditions are checked once up front and abort the whole batch. After
/// that, a failing record is logged and collected, and the batch moves on.
pub async fn apply_batch(
    store: &dyn DataStore,
    target: BatchTarget<'_>,
    concurrency: usize,
) -> Result<BatchOutcome, ApplyError> {
    if target.strategy == Strategy::Reassign && target.new_owner_id.is_none() {
        return Err(ApplyError::Precondition(format!(
            "batch reassign of {}.{} requires a new owner id",
            target.table, target.field
        )));
    }

    debug!(
        "Applying {} to {} records of {}.{}",
        target.strategy,
        target.records.len(),
        target.table,
        target.field
    );

    let sweeps = matches!(target.strategy, Strategy::Delete | Strategy::Anonymize)
        && !target.storage_fields.is_empty();

    let results: Vec<(String, Result<(ApplyOutcome, usize), ApplyError>)> =
        stream::iter(target.records.iter())
            .map(|record| async move {
                let swept = if sweeps {
                    match sweep_record(store, record, target.storage_fields).await {
                        Ok(swept) => swept,
                        Err(e) => return (record.id.clone(), Err(e)),
                    }
                } else {
                    SweepOutcome::default()
                };

                let cleared: &[String] = if target.strategy == Strategy::Anonymize {
                    &swept.fields
                } else {
                    &[]
                };
                let result = apply_strategy(
                    store,
                    target.strategy,
                    target.table,
                    target.field,
                    record,
                    target.new_owner_id,
                    cleared,
                )
                .await
                .map(|outcome| (outcome, swept.files_deleted));
                (record.id.clone(), result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut outcome = BatchOutcome::default();
    for (id, result) in results {
        match result {
            Ok((applied, files)) => {
                outcome.processed += 1;
                outcome.files_deleted += files;
                if applied == ApplyOutcome::Applied {
                    outcome.changed += 1;
                }
            }
            Err(e) => {
                warn!(
                    "Skipping {}/{} after failure, batch continues: {}",
                    target.table, id, e
                );
                outcome.failures.push(ItemFailure {
                    table: target.table.to_string(),
                    field: target.field.to_string(),
                    id,
                    error: e.to_string(),
                });
            }
        }
    }

    if outcome.failed() > 0 {
        info!(
            "Batch {}.{} finished: {} processed, {} failed",
            target.table,
            target.field,
            outcome.processed,
            outcome.failed()
        );
    }

    Ok(outcome)
}


pub async fn delete_batch(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    records: &[Record],
) -> Result<BatchOutcome, ApplyError> {
    let target = BatchTarget {
        table,
        field,
        strategy: Strategy::Delete,
        records,
        storage_fields: &[],
        new_owner_id: None,
    };
    apply_batch(store, target, 1).await
}

pub async fn anonymize_batch(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    records: &[Record],
) -> Result<BatchOutcome, ApplyError> {
    let target = BatchTarget {
        table,
        field,
        strategy: Strategy::Anonymize,
        records,
        storage_fields: &[],
        new_owner_id: None,
    };
    apply_batch(store, target, 1).await
}

pub async fn reassign_batch(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    records: &[Record],
    new_owner_id: Option<&str>,
) -> Result<BatchOutcome, ApplyError> {
    let target = BatchTarget {
        table,
        field,
        strategy: Strategy::Reassign,
        records,
        storage_fields: &[],
        new_owner_id,
    };
    apply_batch(store, target, 1).await
}

pub async fn preserve_batch(
    store: &dyn DataStore,
    table: &str,
    field: &str,
    records: &[Record],
) -> Result<BatchOutcome, ApplyError> {
    let target = BatchTarget {
        table,
        field,
        strategy: Strategy::Preserve,
        records,
        storage_fields: &[],
        new_owner_id: None,
    };
    apply_batch(store, target, 1).await
}
