use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::batch::{apply_batch, BatchTarget};
use super::models::{
    ApplyError, BatchOutcome, CascadeError, CascadeFailure, CascadePlan, CascadeReport,
    FieldReport, PlanEntry, TableReport,
};
use super::policy::{NoReassignPolicy, ReassignPolicy};
use crate::db::{DataStore, Record, StoreError};
use crate::manifest::{DeletionManifest, Strategy};

/// Runs the manifest against a data store for one deleted user.
///
/// Tables are processed one after another, each field in strategy priority
/// order, each field's matches in chunks of the table's batch size. A rerun
/// after a crash converges on the same end state.
pub struct CascadeExecutor {
    store: Arc<dyn DataStore>,
    manifest: Arc<DeletionManifest>,
    policy: Arc<dyn ReassignPolicy>,
    concurrency: usize,
}

impl CascadeExecutor {
    pub fn new(store: Arc<dyn DataStore>, manifest: Arc<DeletionManifest>) -> Self {
        Self {
            store,
            manifest,
            policy: Arc::new(NoReassignPolicy),
            concurrency: crate::DEFAULT_BATCH_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ReassignPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn manifest(&self) -> &DeletionManifest {
        &self.manifest
    }

    
    fn ordered_fields(&self, table: &str) -> Vec<(String, Strategy)> {
        let mut fields: Vec<(String, Strategy)> = self
            .manifest
            .table_config(table)
            .map(|config| {
                config
                    .fields
                    .iter()
                    .map(|(field, strategy)| (field.clone(), *strategy))
                    .collect()
            })
            .unwrap_or_default();
        fields.sort_by(|a, b| a.1.priority().cmp(&b.1.priority()).then_with(|| a.0.cmp(&b.0)));
        fields
    }

    async fn matching_records(
        &self,
        table: &str,
        field: &str,
        user_id: &str,
    ) -> Result<Vec<Record>, CascadeError> {
        let index = self.manifest.index_for(table, field);

        let records = self
            .store
            .query_by_index(table, index, user_id)
            .await
            .map_err(|source| {
                error!("Query {} on {} failed: {}", index, table, source);
                CascadeError::Query {
                    table: table.to_string(),
                    index: index.to_string(),
                    source,
                }
            })?;

        
        Ok(records
            .into_iter()
            .filter(|r| r.references(field, user_id))
            .collect())
    }

    async fn resolve_owner(
        &self,
        table: &str,
        field: &str,
        user_id: &str,
        explicit: Option<&str>,
    ) -> Result<String, CascadeError> {
        let owner = match explicit {
            Some(owner) => Some(owner.to_string()),
            None => self.policy.resolve_new_owner(table, field, user_id).await,
        };

        match owner {
            Some(owner) if owner == user_id => Err(CascadeError::Precondition {
                table: table.to_string(),
                field: field.to_string(),
                message: "cannot reassign to the user being deleted".to_string(),
            }),
            Some(owner) => Ok(owner),
            None => Err(CascadeError::Precondition {
                table: table.to_string(),
                field: field.to_string(),
                message: "no new owner supplied and no reassignment policy applies".to_string(),
            }),
        }
    }

    /// Resolves a new owner for every reassign field that has matches, so a
    /// missing owner fails the run before anything is written.
    async fn preflight(
        &self,
        user_id: &str,
        new_owner_id: Option<&str>,
    ) -> Result<HashMap<(String, String), String>, CascadeError> {
        let mut owners = HashMap::new();

        for table in self.manifest.cascade_tables() {
            for (field, strategy) in self.ordered_fields(table) {
                if strategy != Strategy::Reassign {
                    continue;
                }
                if self.matching_records(table, &field, user_id).await?.is_empty() {
                    continue;
                }
                let owner = self.resolve_owner(table, &field, user_id, new_owner_id).await?;
                owners.insert((table.to_string(), field), owner);
            }
        }

        Ok(owners)
    }

    async fn run_table(
        &self,
        table: &str,
        user_id: &str,
        new_owner_id: Option<&str>,
        owners: &HashMap<(String, String), String>,
        report: &mut CascadeReport,
    ) -> Result<TableReport, CascadeError> {
        let batch_size = self.manifest.batch_size(table);
        let storage_fields = self.manifest.storage_fields(table);
        let mut table_report = TableReport {
            table: table.to_string(),
            ..Default::default()
        };

        for (field, strategy) in self.ordered_fields(table) {
            let records = self.matching_records(table, &field, user_id).await?;
            debug!("{}.{}: {} records reference {}", table, field, records.len(), user_id);

            if records.is_empty() {
                table_report.fields.push(FieldReport {
                    field,
                    strategy,
                    matched: 0,
                    processed: 0,
                    changed: 0,
                    failed: 0,
                });
                continue;
            }

            let owner = match strategy {
                Strategy::Reassign => match owners.get(&(table.to_string(), field.clone())) {
                    Some(owner) => Some(owner.clone()),
                    None => Some(self.resolve_owner(table, &field, user_id, new_owner_id).await?),
                },
                _ => None,
            };

            let mut field_outcome = BatchOutcome::default();
            for chunk in records.chunks(batch_size) {
                let target = BatchTarget {
                    table,
                    field: &field,
                    strategy,
                    records: chunk,
                    storage_fields,
                    new_owner_id: owner.as_deref(),
                };

                let outcome = apply_batch(self.store.as_ref(), target, self.concurrency)
                    .await
                    .map_err(|e| match e {
                        ApplyError::Precondition(message) => CascadeError::Precondition {
                            table: table.to_string(),
                            field: field.clone(),
                            message,
                        },
                        ApplyError::Store { source, .. } => CascadeError::Query {
                            table: table.to_string(),
                            index: self.manifest.index_for(table, &field).to_string(),
                            source,
                        },
                    })?;
                field_outcome.merge(outcome);
            }

            table_report.files_deleted += field_outcome.files_deleted;
            table_report.fields.push(FieldReport {
                field,
                strategy,
                matched: records.len(),
                processed: field_outcome.processed,
                changed: field_outcome.changed,
                failed: field_outcome.failed(),
            });
            report.failures.extend(field_outcome.failures);
        }

        Ok(table_report)
    }

    /// Resolves every reference to `user_id` across the cascade tables.
    ///
    /// The identity document is left in place: it carries the external handle
    /// a resumed deletion still needs. Remove it with `delete_identity` once
    /// every later step has run.
    pub async fn run(
        &self,
        user_id: &str,
        new_owner_id: Option<&str>,
    ) -> Result<CascadeReport, CascadeFailure> {
        info!(
            "Starting cascade for {} across {} tables",
            user_id,
            self.manifest.cascade_tables().len()
        );

        let mut report = CascadeReport::new(user_id);

        let owners = match self.preflight(user_id, new_owner_id).await {
            Ok(owners) => owners,
            Err(error) => {
                error!("Cascade for {} rejected before any write: {}", user_id, error);
                return Err(CascadeFailure {
                    error,
                    partial: report,
                });
            }
        };

        for table in self.manifest.cascade_tables() {
            match self
                .run_table(table, user_id, new_owner_id, &owners, &mut report)
                .await
            {
                Ok(table_report) => report.tables.push(table_report),
                Err(error) => {
                    error!("Cascade for {} aborted at {}: {}", user_id, table, error);
                    return Err(CascadeFailure {
                        error,
                        partial: report,
                    });
                }
            }
        }

        if !report.is_complete() {
            warn!(
                "Cascade for {} left {} records unresolved; rerun to resume",
                user_id,
                report.failures.len()
            );
            return Err(CascadeFailure {
                error: CascadeError::Incomplete(report.failures.len()),
                partial: report,
            });
        }

        info!(
            "Cascade for {} complete: {} deleted, {} anonymized, {} reassigned, {} files",
            user_id,
            report.records_deleted(),
            report.records_anonymized(),
            report.records_reassigned(),
            report.files_deleted()
        );
        Ok(report)
    }

    /// Removes the identity document. An already missing document counts as
    /// removed.
    pub async fn delete_identity(&self, user_id: &str) -> Result<(), StoreError> {
        let identity_table = self.manifest.identity_table();
        match self.store.delete(identity_table, user_id).await {
            Ok(()) => {
                info!("Deleted identity {}/{}", identity_table, user_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Identity {}/{} already gone", identity_table, user_id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete identity {}/{}: {}", identity_table, user_id, e);
                Err(e)
            }
        }
    }

    /// Dry run: counts what `run` would touch without writing anything.
    pub async fn plan(&self, user_id: &str) -> Result<CascadePlan, CascadeError> {
        let mut plan = CascadePlan {
            user_id: user_id.to_string(),
            entries: Vec::new(),
        };

        for table in self.manifest.cascade_tables() {
            let storage_fields = self.manifest.storage_fields(table);

            for (field, strategy) in self.ordered_fields(table) {
                let records = self.matching_records(table, &field, user_id).await?;
                let blobs = match strategy {
                    Strategy::Delete | Strategy::Anonymize => records
                        .iter()
                        .flat_map(|r| storage_fields.iter().map(move |f| r.blob_ids(f).len()))
                        .sum(),
                    _ => 0,
                };

                plan.entries.push(PlanEntry {
                    table: table.to_string(),
                    field,
                    strategy,
                    records: records.len(),
                    blobs,
                });
            }
        }

        debug!(
            "Plan for {}: {} records, {} blobs",
            user_id,
            plan.total_records(),
            plan.total_blobs()
        );
        Ok(plan)
    }
}
