//! The per-file scan state machine.
//!
//! One [`LineValidator`] per record kind streams its file line by line:
//! `Init -> Header -> PerLine* -> Done | Aborted`. Recoverable row errors
//! are collected up to the error budget and the line is skipped; a file
//! exceeding the budget stops early and is marked failed; a date-format
//! change mid-file is the one condition that raises immediately. Peak
//! memory is the counters plus the error list, itself bounded by the
//! budget, so file size is irrelevant.

use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use ehr_ingest::reader::{DelimitedReader, RawLine};
use ehr_model::dates::DateFormat;
use ehr_model::{InputDescriptor, RecordKind};

use crate::error::ScanError;
use crate::kinds::{AcceptedLine, NumericRequirements, attributes_ok};
use crate::sort::{SortPolicy, SortTracker};
use crate::stats::ScanStats;

/// Default recoverable-error budget per file.
pub const MAX_ERRORS: usize = 1000;

/// Why a scan stopped before end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// Header had fewer columns than the mandatory set.
    MalformedHeader,
    /// The recoverable-error budget was exhausted.
    ErrorBudget,
}

/// Outcome of one file scan.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub kind: RecordKind,
    /// One entry per rejected line: `"[<line>]   <reason> -- <raw>"`.
    pub errors: Vec<String>,
    pub is_sorted: bool,
    /// True when only the header was read. Fatal for the patients file,
    /// tolerated for the others.
    pub is_empty: bool,
    pub aborted: Option<AbortReason>,
    /// The date format the scan settled on, if any line allowed detection.
    pub date_format: Option<DateFormat>,
    pub stats: ScanStats,
}

impl ScanReport {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            errors: Vec::new(),
            is_sorted: true,
            is_empty: true,
            aborted: None,
            date_format: None,
            stats: ScanStats::new(),
        }
    }

    /// A failed scan: aborted early, or empty where empty is not allowed.
    pub fn failed(&self) -> bool {
        self.aborted.is_some() || (self.is_empty && !self.kind.may_be_empty())
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    fn record_error(&mut self, line: u64, reason: &str, raw: &str) {
        self.errors.push(format!("[{line}]   {reason} -- {raw}"));
        self.stats.reject();
    }
}

/// Streaming validator for one record kind.
pub struct LineValidator {
    descriptor: InputDescriptor,
    numeric: NumericRequirements,
    policy: SortPolicy,
    max_errors: usize,
}

impl LineValidator {
    pub fn new(descriptor: InputDescriptor) -> Self {
        let policy = SortPolicy::for_kind(descriptor.kind);
        Self {
            descriptor,
            numeric: NumericRequirements::new(),
            policy,
            max_errors: MAX_ERRORS,
        }
    }

    /// Supply the type -> numeric-columns requirement table.
    pub fn with_numeric_requirements(mut self, numeric: NumericRequirements) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn descriptor(&self) -> &InputDescriptor {
        &self.descriptor
    }

    /// Scan a file on disk.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanReport, ScanError> {
        let mut reader = DelimitedReader::open(path, self.descriptor.delimiter)?;
        self.scan(&mut reader)
    }

    /// Scan without consuming accepted lines.
    pub fn scan<R: BufRead>(
        &self,
        reader: &mut DelimitedReader<R>,
    ) -> Result<ScanReport, ScanError> {
        self.scan_with(reader, |_, _| Ok(()))
    }

    /// Scan, handing every accepted line to `sink` (the encode pipeline
    /// builds records there). A sink error aborts the scan.
    pub fn scan_with<R: BufRead>(
        &self,
        reader: &mut DelimitedReader<R>,
        mut sink: impl FnMut(&RawLine, &AcceptedLine) -> anyhow::Result<()>,
    ) -> Result<ScanReport, ScanError> {
        let kind = self.descriptor.kind;
        let mut report = ScanReport::new(kind);
        let mut tracker = SortTracker::new(self.policy);
        let mut reference_format = self.descriptor.date_format;
        let expected_columns = self.descriptor.expected_columns();
        let date_columns = self.descriptor.date_columns();

        // Header
        let Some(header) = reader.next_line()? else {
            debug!(kind = %kind, "input has no header");
            return Ok(report);
        };
        if header.columns.len() < kind.mandatory_columns().len() {
            report.record_error(
                header.number,
                &format!(
                    "header has {} columns, {} required",
                    header.columns.len(),
                    kind.mandatory_columns().len()
                ),
                &header.raw,
            );
            report.aborted = Some(AbortReason::MalformedHeader);
            return Ok(report);
        }

        // Per line
        while report.error_count() < self.max_errors {
            let Some(line) = reader.next_line()? else {
                break;
            };
            report.is_empty = false;
            report.stats.lines_read += 1;

            if line.is_empty() {
                report.record_error(line.number, "empty line", &line.raw);
                continue;
            }
            if line.columns.len() != expected_columns {
                report.record_error(
                    line.number,
                    &format!(
                        "wrong number of columns: {} instead of {expected_columns}",
                        line.columns.len()
                    ),
                    &line.raw,
                );
                continue;
            }

            // Date-format detection. The reference settles within the
            // first budget-worth of lines; a conflicting line anywhere in
            // the file is fatal.
            for &index in &date_columns {
                let Some(found) = line.columns.get(index).and_then(|v| DateFormat::detect(v))
                else {
                    continue;
                };
                match reference_format {
                    None if report.stats.lines_read <= self.max_errors as u64 => {
                        debug!(kind = %kind, format = %found, line = line.number, "date format detected");
                        reference_format = Some(found);
                    }
                    Some(expected) if expected != found => {
                        return Err(ScanError::DateFormatConflict {
                            line: line.number,
                            expected,
                            found,
                        });
                    }
                    _ => {}
                }
            }
            let format = reference_format.unwrap_or(DateFormat::DayMonthYear);

            match attributes_ok(&line.columns, &self.descriptor, format, &self.numeric) {
                Err(reason) => {
                    report.record_error(line.number, &reason, &line.raw);
                }
                Ok(accepted) => {
                    tracker.observe(&accepted.subset_id, &accepted.patient_id);
                    report.stats.accept(accepted.date, &accepted.type_value);
                    sink(&line, &accepted).map_err(ScanError::Io)?;
                }
            }
        }
        if report.error_count() >= self.max_errors {
            warn!(kind = %kind, errors = report.error_count(), "error budget exhausted, scan aborted");
            report.aborted = Some(AbortReason::ErrorBudget);
        }

        report.is_sorted = tracker.is_sorted();
        report.date_format = reference_format;
        debug!(
            kind = %kind,
            accepted = report.stats.records_accepted,
            rejected = report.stats.records_rejected,
            sorted = report.is_sorted,
            "scan finished"
        );
        Ok(report)
    }
}
