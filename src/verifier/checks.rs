use tracing::{debug, info, warn};

use super::report::{CoverageReport, MultiReferenceTable, Violation, ViolationKind};
use crate::manifest::DeletionManifest;
use crate::schema::{SchemaDescription, TableDescription};

/// Cross-checks a schema description against the deletion manifest.
///
/// Has no runtime dependencies: it reads two descriptions and reports, so it
/// can gate a build before anything ships.
pub struct CoverageVerifier<'a> {
    manifest: &'a DeletionManifest,
}

impl<'a> CoverageVerifier<'a> {
    pub fn new(manifest: &'a DeletionManifest) -> Self {
        Self { manifest }
    }

    pub fn verify(&self, schema: &SchemaDescription) -> CoverageReport {
        let mut report = CoverageReport::default();
        let identity_table = self.manifest.identity_table();

        for table in &schema.tables {
            if table.name == identity_table {
                continue;
            }
            report.tables_checked += 1;
            report.identity_fields_checked += table.identity_fields().count();

            self.check_registration(table, &mut report);
            self.check_strategies(table, &mut report);
            self.check_indexes(table, &mut report);
            self.check_storage_fields(table, &mut report);
            self.collect_multi_reference(table, &mut report);
        }

        self.check_stale_entries(schema, &mut report);

        if report.is_passing() {
            info!(
                "Deletion coverage complete: {} tables, {} identity references",
                report.tables_checked, report.identity_fields_checked
            );
        } else {
            warn!(
                "Deletion coverage incomplete: {} violations",
                report.violations.len()
            );
        }
        report
    }

    fn check_registration(&self, table: &TableDescription, report: &mut CoverageReport) {
        let fields: Vec<&str> = table.identity_fields().map(|f| f.name.as_str()).collect();
        if fields.is_empty()
            || self.manifest.is_cascade(&table.name)
            || self.manifest.is_preserved(&table.name)
        {
            return;
        }

        report.violations.push(Violation::new(
            ViolationKind::UnregisteredTable,
            &table.name,
            None,
            format!("references users through {} but is neither cascade nor preserve", fields.join(", ")),
        ));
    }

    fn check_strategies(&self, table: &TableDescription, report: &mut CoverageReport) {
        if !self.manifest.is_cascade(&table.name) {
            return;
        }

        for field in table.identity_fields() {
            if self.manifest.field_strategy(&table.name, &field.name).is_none() {
                report.violations.push(Violation::new(
                    ViolationKind::MissingStrategy,
                    &table.name,
                    Some(field.name.as_str()),
                    "identity reference has no deletion strategy",
                ));
            }
        }
    }

    fn check_indexes(&self, table: &TableDescription, report: &mut CoverageReport) {
        if !self.manifest.is_cascade(&table.name) {
            return;
        }

        for field in table.identity_fields() {
            let index_name = self.manifest.index_for(&table.name, &field.name);
            let detail = match table.find_index(index_name) {
                Some(index) if index.covers(&field.name) => continue,
                Some(index) => format!(
                    "index `{}` leads with [{}], not `{}`",
                    index_name,
                    index.fields.join(", "),
                    field.name
                ),
                None => format!("no index named `{}` is declared", index_name),
            };
            debug!("{}.{}: {}", table.name, field.name, detail);
            report.violations.push(Violation::new(
                ViolationKind::MissingIndex,
                &table.name,
                Some(field.name.as_str()),
                detail,
            ));
        }
    }

    fn check_storage_fields(&self, table: &TableDescription, report: &mut CoverageReport) {
        if self.manifest.is_preserved(&table.name) || table.identity_fields().next().is_none() {
            return;
        }

        let registered = self.manifest.storage_fields(&table.name);
        for field in table.blob_fields() {
            if registered.iter().any(|f| f == &field.name) {
                continue;
            }
            let how = if field.is_storage_reference.is_some() {
                "annotated as a storage reference"
            } else {
                "looks like a storage reference by name"
            };
            report.violations.push(Violation::new(
                ViolationKind::MissingStorageField,
                &table.name,
                Some(field.name.as_str()),
                format!("{} but is not swept; its blobs would outlive the user", how),
            ));
        }
    }

    fn collect_multi_reference(&self, table: &TableDescription, report: &mut CoverageReport) {
        if table.identity_fields().count() < 2 {
            return;
        }

        report.multi_reference_tables.push(MultiReferenceTable {
            table: table.name.clone(),
            fields: table
                .identity_fields()
                .map(|f| {
                    (
                        f.name.clone(),
                        self.manifest.field_strategy(&table.name, &f.name),
                    )
                })
                .collect(),
        });
    }

    fn check_stale_entries(&self, schema: &SchemaDescription, report: &mut CoverageReport) {
        let identity_table = self.manifest.identity_table();

        if self.manifest.is_cascade(identity_table) || self.manifest.is_preserved(identity_table) {
            report.violations.push(Violation::new(
                ViolationKind::StaleManifestEntry,
                identity_table,
                None,
                "identity table is removed by the orchestrator and must not be registered",
            ));
        }

        for table_name in self.manifest.cascade_tables() {
            let Some(table) = schema.table(table_name) else {
                report.violations.push(Violation::new(
                    ViolationKind::StaleManifestEntry,
                    table_name,
                    None,
                    "cascade table does not exist in the schema",
                ));
                continue;
            };

            let Some(config) = self.manifest.table_config(table_name) else {
                continue;
            };
            for (field_name, strategy) in &config.fields {
                let detail = match table.find_field(field_name) {
                    None => format!("{} strategy registered for a field that does not exist", strategy),
                    Some(field) if !field.is_identity_reference => {
                        format!("{} strategy registered for a field that is not an identity reference", strategy)
                    }
                    Some(_) => continue,
                };
                report.violations.push(Violation::new(
                    ViolationKind::StaleManifestEntry,
                    table_name,
                    Some(field_name.as_str()),
                    detail,
                ));
            }
        }

        for table_name in self.manifest.preserved_tables() {
            if !schema.has_table(table_name) {
                report.violations.push(Violation::new(
                    ViolationKind::StaleManifestEntry,
                    table_name,
                    None,
                    "preserved table does not exist in the schema",
                ));
            }
        }

        for table_name in self.manifest.storage_tables() {
            if !self.manifest.is_cascade(table_name) {
                report.violations.push(Violation::new(
                    ViolationKind::StaleManifestEntry,
                    table_name,
                    None,
                    "storage fields registered on a table the cascade never visits",
                ));
                continue;
            }
            let Some(table) = schema.table(table_name) else {
                continue;
            };
            for field_name in self.manifest.storage_fields(table_name) {
                if table.find_field(field_name).is_none() {
                    report.violations.push(Violation::new(
                        ViolationKind::StaleManifestEntry,
                        table_name,
                        Some(field_name.as_str()),
                        "storage field does not exist in the schema",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{application_manifest, Strategy, TableConfig};
    use crate::schema::FieldDescription;

    fn schema() -> SchemaDescription {
        SchemaDescription::new(vec![
            TableDescription::new("users").field(FieldDescription::new("externalId")),
            TableDescription::new("notes")
                .field(FieldDescription::identity("authorId"))
                .field(FieldDescription::new("attachmentStorageId"))
                .index("by_author", &["authorId"]),
            TableDescription::new("tasks")
                .field(FieldDescription::identity("assigneeId"))
                .field(FieldDescription::identity("reviewerId"))
                .index("by_user", &["assigneeId"]),
            TableDescription::new("invites").field(FieldDescription::identity("invitedBy")),
            TableDescription::new("auditLog").field(FieldDescription::identity("actorId")),
            TableDescription::new("currencies").field(FieldDescription::new("code")),
        ])
    }

    fn manifest() -> DeletionManifest {
        DeletionManifest::builder()
            .cascade(
                "notes",
                TableConfig::new().field("authorId", Strategy::Delete).index("by_author"),
            )
            .cascade("tasks", TableConfig::new().field("assigneeId", Strategy::Reassign))
            .preserve("auditLog")
            .build()
            .unwrap()
    }

    #[test]
    fn test_detects_each_category() {
        let manifest = manifest();
        let report = CoverageVerifier::new(&manifest).verify(&schema());

        assert!(!report.is_passing());
        assert_eq!(report.tables_checked, 5);
        assert_eq!(report.identity_fields_checked, 5);
        assert_eq!(report.locations(ViolationKind::UnregisteredTable), vec!["invites"]);
        assert_eq!(report.locations(ViolationKind::MissingStrategy), vec!["tasks.reviewerId"]);
        assert_eq!(report.locations(ViolationKind::MissingIndex), vec!["tasks.reviewerId"]);
        assert_eq!(
            report.locations(ViolationKind::MissingStorageField),
            vec!["notes.attachmentStorageId"]
        );
        assert_eq!(report.count(ViolationKind::StaleManifestEntry), 0);

        assert_eq!(report.multi_reference_tables.len(), 1);
        assert_eq!(report.multi_reference_tables[0].table, "tasks");
        assert_eq!(
            report.multi_reference_tables[0].fields,
            vec![
                ("assigneeId".to_string(), Some(Strategy::Reassign)),
                ("reviewerId".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_complete_coverage_passes() {
        let manifest = DeletionManifest::builder()
            .cascade(
                "notes",
                TableConfig::new().field("authorId", Strategy::Delete).index("by_author"),
            )
            .cascade(
                "tasks",
                TableConfig::new()
                    .field("assigneeId", Strategy::Reassign)
                    .field("reviewerId", Strategy::Anonymize)
                    .field_index("reviewerId", "by_reviewer"),
            )
            .cascade("invites", TableConfig::new().field("invitedBy", Strategy::Delete))
            .preserve("auditLog")
            .storage("notes", &["attachmentStorageId"])
            .build()
            .unwrap();

        let mut schema = schema();
        for table in &mut schema.tables {
            match table.name.as_str() {
                "tasks" => table.indexes.push(crate::schema::IndexDescription::new("by_reviewer", &["reviewerId"])),
                "invites" => table.indexes.push(crate::schema::IndexDescription::new("by_user", &["invitedBy"])),
                _ => {}
            }
        }

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        assert!(report.is_passing(), "{}", report.render());
        assert_eq!(report.multi_reference_tables.len(), 1);
    }

    #[test]
    fn test_index_must_lead_with_field() {
        let manifest = DeletionManifest::builder()
            .cascade("notes", TableConfig::new().field("authorId", Strategy::Delete))
            .build()
            .unwrap();
        let schema = SchemaDescription::new(vec![TableDescription::new("notes")
            .field(FieldDescription::identity("authorId"))
            .index("by_user", &["workspaceId", "authorId"])]);

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        let violation = report.of_kind(ViolationKind::MissingIndex).next().unwrap();
        assert!(violation.detail.contains("leads with [workspaceId, authorId]"));
    }

    #[test]
    fn test_stale_entries() {
        let manifest = DeletionManifest::builder()
            .cascade("ghosts", TableConfig::new().field("userId", Strategy::Delete))
            .cascade(
                "notes",
                TableConfig::new()
                    .field("authorId", Strategy::Delete)
                    .field("title", Strategy::Anonymize)
                    .index("by_author"),
            )
            .preserve("oldAudit")
            .storage("notes", &["missingFileId"])
            .storage("currencies", &["flagStorageId"])
            .build()
            .unwrap();
        let schema = SchemaDescription::new(vec![
            TableDescription::new("notes")
                .field(FieldDescription::identity("authorId"))
                .field(FieldDescription::new("title"))
                .index("by_author", &["authorId"]),
            TableDescription::new("currencies").field(FieldDescription::new("code")),
        ]);

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        let mut stale = report.locations(ViolationKind::StaleManifestEntry);
        stale.sort();
        assert_eq!(
            stale,
            vec!["currencies", "ghosts", "notes.missingFileId", "notes.title", "oldAudit"]
        );
    }

    #[test]
    fn test_explicit_false_annotation_suppresses_heuristic() {
        let manifest = DeletionManifest::builder()
            .cascade("invoices", TableConfig::new().field("createdBy", Strategy::Anonymize))
            .build()
            .unwrap();
        let schema = SchemaDescription::new(vec![TableDescription::new("invoices")
            .field(FieldDescription::identity("createdBy"))
            .field(FieldDescription {
                is_storage_reference: Some(false),
                ..FieldDescription::new("pdfFileId")
            })
            .index("by_user", &["createdBy"])]);

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        assert!(report.is_passing(), "{}", report.render());
    }

    #[test]
    fn test_application_fixtures_are_fully_covered() {
        let manifest = application_manifest().unwrap();
        let schema =
            SchemaDescription::from_json(include_str!("../../fixtures/schema.json")).unwrap();

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        assert!(report.is_passing(), "{}", report.render());
        let multi: Vec<&str> = report
            .multi_reference_tables
            .iter()
            .map(|t| t.table.as_str())
            .collect();
        assert_eq!(multi, vec!["clients", "tasks"]);
    }

    #[test]
    fn test_removing_a_strategy_names_the_field() {
        let manifest: DeletionManifest = serde_json::from_str(
            &include_str!("../../fixtures/manifest.json")
                .replace(r#""ownerId": "reassign", "createdBy": "anonymize""#, r#""ownerId": "reassign""#),
        )
        .unwrap();
        let schema =
            SchemaDescription::from_json(include_str!("../../fixtures/schema.json")).unwrap();

        let report = CoverageVerifier::new(&manifest).verify(&schema);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.locations(ViolationKind::MissingStrategy), vec!["clients.createdBy"]);
    }
}
