use ehr_model::DateFormat;
use thiserror::Error;

/// Conditions that abort a file scan immediately instead of being queued
/// as recoverable row errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Different date formats within one file are never tolerated.
    #[error(
        "date format changed mid-file at line {line}: file uses {expected}, found {found}"
    )]
    DateFormatConflict {
        line: u64,
        expected: DateFormat,
        found: DateFormat,
    },
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}
