pub mod checks;
pub mod report;

pub use checks::CoverageVerifier;
pub use report::{CoverageReport, MultiReferenceTable, Violation, ViolationKind};
