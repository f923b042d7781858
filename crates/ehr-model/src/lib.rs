//! Patient history record model and compression codec.
//!
//! Raw tabular extracts scatter one patient's history over four files;
//! this crate defines the entities those rows compress into and the rules
//! for converting between human-readable rows, compact integer-coded rows,
//! and the export string formats. Categorical strings are replaced by
//! small indices into append-only lookup tables; dates become day offsets
//! from a fixed epoch; `-1` is the wire sentinel for absent data.

pub mod dates;
pub mod episode;
pub mod error;
pub mod gender;
pub mod lookup;
pub mod patient;
pub mod source;

pub use dates::{DateBounds, DateFormat, format_date, parse_date};
pub use episode::{Episode, EpisodeDetail, ExtendedValue, type_table};
pub use error::{ModelError, Result};
pub use gender::Gender;
pub use lookup::{Interned, LookupRegistry, LookupTable, NO_DATA, NO_DATA_LABEL};
pub use patient::{Cohort, NO_COHORT_LABEL, Patient};
pub use source::{DEFAULT_SUBSET, ExtendedColumn, InputDescriptor, RecordKind};
