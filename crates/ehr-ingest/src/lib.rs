//! Reading raw extracts and persisting their compressed forms.
//!
//! Three surfaces:
//!
//! - [`reader`]: streaming line reader over delimited text, the only way
//!   raw extract bytes enter the system.
//! - [`lookup_store`]: append-only lookup-file persistence with
//!   flush-on-growth for the hooked tables.
//! - [`store`] / [`export`]: the compact encoded patient-object rows and
//!   the uncompressed analysis-ready CSV.

pub mod export;
pub mod lookup_store;
pub mod reader;
pub mod store;

pub use export::{ExportWriter, export_headers};
pub use lookup_store::LookupStore;
pub use reader::{DelimitedReader, RawLine, split_columns};
pub use store::{EncodedReader, EncodedWriter, read_patients};
