use std::fmt::Write;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::manifest::Strategy;


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnregisteredTable,
    MissingStrategy,
    MissingIndex,
    MissingStorageField,
    StaleManifestEntry,
}

impl ViolationKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::UnregisteredTable => "Unregistered tables",
            Self::MissingStrategy => "Missing strategies",
            Self::MissingIndex => "Missing indexes",
            Self::MissingStorageField => "Missing storage fields",
            Self::StaleManifestEntry => "Stale manifest entries",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::UnregisteredTable => {
                "register the table under `cascade` with a strategy per field, or under `preserve`"
            }
            Self::MissingStrategy => {
                "add the field to the table's `fields` with delete, anonymize, reassign or preserve"
            }
            Self::MissingIndex => {
                "declare an index leading with the field under the manifest's index name, or set `fieldIndexes`"
            }
            Self::MissingStorageField => {
                "list the field under `storageFields` so its blobs are swept, or annotate it `isStorageReference: false`"
            }
            Self::StaleManifestEntry => "remove or correct the manifest entry to match the schema",
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub table: String,
    pub field: Option<String>,
    pub detail: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, table: &str, field: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.to_string(),
            field: field.map(str::to_string),
            detail: detail.into(),
        }
    }

    /// `table.field`, or just `table` for table-level findings.
    pub fn location(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{}", self.table, field),
            None => self.table.clone(),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiReferenceTable {
    pub table: String,
    pub fields: Vec<(String, Option<Strategy>)>,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub tables_checked: usize,
    pub identity_fields_checked: usize,
    pub violations: Vec<Violation>,
    pub multi_reference_tables: Vec<MultiReferenceTable>,
}

impl CoverageReport {
    pub fn is_passing(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_passing() { 0 } else { 1 }
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn locations(&self, kind: ViolationKind) -> Vec<String> {
        self.of_kind(kind).map(Violation::location).collect()
    }

    /// Plain-text report grouped by category, every category listed.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Deletion coverage report");
        let _ = writeln!(out, "========================");
        let _ = writeln!(
            out,
            "Tables checked: {}, identity references: {}",
            self.tables_checked, self.identity_fields_checked
        );

        for kind in ViolationKind::iter() {
            let violations: Vec<&Violation> = self.of_kind(kind).collect();
            let _ = writeln!(out);
            let _ = writeln!(out, "{} ({})", kind.title(), violations.len());
            if violations.is_empty() {
                let _ = writeln!(out, "  none");
                continue;
            }
            for violation in &violations {
                let _ = writeln!(out, "  - {}: {}", violation.location(), violation.detail);
            }
            let _ = writeln!(out, "  hint: {}", kind.hint());
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Multi-reference tables ({}, informational)",
            self.multi_reference_tables.len()
        );
        if self.multi_reference_tables.is_empty() {
            let _ = writeln!(out, "  none");
        }
        for table in &self.multi_reference_tables {
            let fields: Vec<String> = table
                .fields
                .iter()
                .map(|(field, strategy)| match strategy {
                    Some(strategy) => format!("{}={}", field, strategy),
                    None => format!("{}=<none>", field),
                })
                .collect();
            let _ = writeln!(out, "  - {}: {}", table.table, fields.join(", "));
        }
        if !self.multi_reference_tables.is_empty() {
            let _ = writeln!(out, "  confirm each field's strategy is intentional");
        }

        let _ = writeln!(out);
        if self.is_passing() {
            let _ = writeln!(out, "Result: PASSED");
        } else {
            let _ = writeln!(out, "Result: FAILED ({} violations)", self.violations.len());
        }

        out
    }
}
