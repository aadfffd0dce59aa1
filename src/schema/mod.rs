pub mod heuristics;
pub mod loader;
pub mod models;

pub use heuristics::looks_like_storage_field;
pub use models::{FieldDescription, IndexDescription, SchemaDescription, TableDescription};
