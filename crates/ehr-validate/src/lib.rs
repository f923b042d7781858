//! Ingestion validation for raw health-record extracts.
//!
//! Every input file is scanned line by line before anything reaches the
//! codec: well-formed dates, non-empty identifiers, numeric fields where
//! the workflow demands them, and sort order over `(subset, patient)`.
//! Bad data is reported, not thrown; a multi-hour batch run must survive
//! dirty extracts and tell the operator exactly which lines it dropped.

pub mod error;
pub mod kinds;
pub mod scalar;
pub mod scan;
pub mod sort;
pub mod stats;

pub use error::ScanError;
pub use kinds::{AcceptedLine, NumericRequirements};
pub use scan::{AbortReason, LineValidator, MAX_ERRORS, ScanReport};
pub use sort::{DuplicatePolicy, SortPolicy, SortScope, SortTracker};
pub use stats::ScanStats;
