use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STORAGE_FIELD_PATTERNS: Vec<Regex> = [
        r"(?i)storage_?ids?$",
        r"(?i)^(file|blob|attachment)_?ids?$",
        r"[a-z](File|Blob|Attachment)Ids?$",
        r"(?i)_(file|blob|attachment)_ids?$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect();
}

/// Name-based guess used only when the schema carries no explicit storage
/// annotation for a field.
pub fn looks_like_storage_field(name: &str) -> bool {
    STORAGE_FIELD_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(name))
}
