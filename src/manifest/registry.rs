use super::models::{DeletionManifest, ManifestBuilder, Strategy, TableConfig};
use crate::core::error::Result;


pub const AUDIT_LOG_TABLE: &str = "deletionAuditLog";

pub const ACTIVITY_LOG_TABLE: &str = "activityLog";

/// Deletion policy for every table of the business application that points
/// at a user.
pub fn application_manifest() -> Result<DeletionManifest> {
    application_builder().build()
}

fn application_builder() -> ManifestBuilder {
    DeletionManifest::builder()
        .identity_table("users")
        
        .cascade(
            "clients",
            TableConfig::new()
                .field("ownerId", Strategy::Reassign)
                .field("createdBy", Strategy::Anonymize)
                .index("by_owner")
                .field_index("createdBy", "by_creator"),
        )
        .cascade(
            "invoices",
            TableConfig::new()
                .field("createdBy", Strategy::Anonymize)
                .index("by_creator"),
        )
        .cascade(
            "expenses",
            TableConfig::new()
                .field("submittedBy", Strategy::Anonymize)
                .index("by_submitter"),
        )
        
        .cascade(
            "projects",
            TableConfig::new()
                .field("ownerId", Strategy::Reassign)
                .index("by_owner"),
        )
        .cascade(
            "tasks",
            TableConfig::new()
                .field("assigneeId", Strategy::Reassign)
                .field("createdBy", Strategy::Anonymize)
                .index("by_assignee")
                .field_index("createdBy", "by_creator"),
        )
        .cascade(
            "comments",
            TableConfig::new()
                .field("authorId", Strategy::Anonymize)
                .index("by_author"),
        )
        .cascade(
            "notes",
            TableConfig::new()
                .field("authorId", Strategy::Delete)
                .index("by_author"),
        )
        
        .cascade(
            "emailAccounts",
            TableConfig::new().field("userId", Strategy::Delete),
        )
        .cascade(
            "emails",
            TableConfig::new()
                .field("userId", Strategy::Delete)
                .batch_size(100),
        )
        .cascade(
            "emailAttachments",
            TableConfig::new()
                .field("userId", Strategy::Delete)
                .batch_size(100),
        )
        .cascade(
            "oauthTokens",
            TableConfig::new().field("userId", Strategy::Delete),
        )
        
        .cascade("sessions", TableConfig::new().field("userId", Strategy::Delete))
        .cascade(
            "userPreferences",
            TableConfig::new().field("userId", Strategy::Delete),
        )
        .cascade(
            "profiles",
            TableConfig::new().field("userId", Strategy::Delete),
        )
        .preserve(AUDIT_LOG_TABLE)
        .preserve(ACTIVITY_LOG_TABLE)
        .storage("expenses", &["receiptStorageId"])
        .storage("emails", &["bodyStorageId"])
        .storage("emailAttachments", &["storageId"])
        .storage("profiles", &["avatarStorageId"])
}
