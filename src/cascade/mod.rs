pub mod batch;
pub mod executor;
pub mod models;
pub mod policy;
pub mod strategies;
pub mod sweep;

pub use batch::{anonymize_batch, apply_batch, delete_batch, preserve_batch, reassign_batch, BatchTarget};
pub use executor::CascadeExecutor;
pub use models::{
    ApplyError, ApplyOutcome, BatchOutcome, CascadeError, CascadeFailure, CascadePlan,
    CascadeReport, FieldReport, ItemFailure, PlanEntry, TableReport,
};
pub use policy::{NoReassignPolicy, ReassignPolicy, StaticOwnerPolicy};
pub use strategies::{anonymize_record, apply_strategy, delete_record, preserve_record, reassign_record};
pub use sweep::{sweep_blob, sweep_record, SweepOutcome};
