//! Subcommand drivers.
//!
//! The four file kinds are scanned sequentially, patients first: the
//! patients file is the backbone of a run, and any failure there aborts
//! the whole batch. Failures in the episode files mark the run failed but
//! let the remaining scans finish so the operator sees every problem at
//! once.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{error, info, warn};

use ehr_ingest::{
    DelimitedReader, EncodedReader, EncodedWriter, ExportWriter, LookupStore, read_patients,
};
use ehr_model::lookup::tables;
use ehr_model::{DateFormat, Episode, InputDescriptor, LookupRegistry, Patient, RecordKind};
use ehr_validate::{LineValidator, ScanError, ScanReport};

use crate::cli::{DateFormatArg, EncodeArgs, ExportArgs, InputArgs, ValidateArgs};

/// Outcome of one input file.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub kind: RecordKind,
    pub path: PathBuf,
    pub result: FileResult,
}

#[derive(Debug, Serialize)]
pub enum FileResult {
    Report(ScanReport),
    /// The scan raised instead of finishing (date-format conflict).
    Fatal(String),
}

impl FileOutcome {
    pub fn failed(&self) -> bool {
        match &self.result {
            FileResult::Report(report) => report.failed(),
            FileResult::Fatal(_) => true,
        }
    }
}

/// Everything the summary printer and the exit code need.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
    pub failed: bool,
}

/// Machine-readable report envelope for the external reporting collaborator.
#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    generated_at: String,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

pub fn run_validate(args: &ValidateArgs) -> Result<RunSummary> {
    let summary = scan_inputs(&args.input, |_, _, _| Ok(()))?;
    if let Some(path) = &args.report_json {
        let document = ReportDocument {
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary: &summary,
        };
        let json = serde_json::to_string_pretty(&document).context("serialize scan report")?;
        fs::write(path, json)
            .with_context(|| format!("write report to {}", path.display()))?;
        info!(path = %path.display(), "scan report written");
    }
    Ok(summary)
}

pub fn run_encode(args: &EncodeArgs) -> Result<RunSummary> {
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("create output dir {}", args.output_dir.display()))?;
    let lookup_dir = args
        .lookup_dir
        .clone()
        .unwrap_or_else(|| args.output_dir.join("lookups"));

    let mut registry = LookupRegistry::new();
    let mut store = LookupStore::new(&lookup_dir).with_tables(standard_tables());
    store.load(&mut registry).context("load lookup files")?;

    let output_dir = args.output_dir.clone();
    let max_errors = args.input.max_errors;
    let summary = scan_inputs(&args.input, |kind, path, descriptor| {
        encode_file(
            kind,
            path,
            descriptor,
            max_errors,
            &output_dir,
            &mut registry,
            &mut store,
        )
    })?;

    store.flush(&registry).context("flush lookup files")?;
    Ok(summary)
}

/// Compress one already-validated file into the encoded store. Runs as a
/// second pass so the codec sees the date format the validation pass
/// established.
fn encode_file(
    kind: RecordKind,
    path: &Path,
    descriptor: &InputDescriptor,
    max_errors: usize,
    output_dir: &Path,
    registry: &mut LookupRegistry,
    store: &mut LookupStore,
) -> Result<()> {
    let out_path = output_dir.join(format!("{kind}.dat"));
    let mut writer = EncodedWriter::create(&out_path, kind)?;
    let validator = LineValidator::new(descriptor.clone()).with_max_errors(max_errors);
    let mut reader = DelimitedReader::open(path, descriptor.delimiter)?;
    let result = validator.scan_with(&mut reader, |raw, _accepted| {
        if kind == RecordKind::Patient {
            let patient = Patient::from_input(&raw.columns, descriptor, registry)?;
            writer.write_patient(&patient)?;
        } else {
            let episode = Episode::from_input(&raw.columns, descriptor, registry)?;
            writer.write_episode(&episode)?;
        }
        store.flush(registry)?;
        Ok(())
    });
    match result {
        Ok(report) => {
            info!(
                kind = %kind,
                rows = writer.rows_written(),
                path = %out_path.display(),
                "encoded store written"
            );
            debug_assert_eq!(report.stats.records_accepted, writer.rows_written());
            writer.finish()
        }
        Err(error) => Err(error.into()),
    }
}

pub fn run_export(args: &ExportArgs) -> Result<()> {
    let kind = args.kind.to_kind();
    let mut registry = LookupRegistry::new();
    let mut store = LookupStore::new(&args.lookup_dir).with_tables(standard_tables());
    store.load(&mut registry).context("load lookup files")?;

    let descriptor = InputDescriptor::new(kind);
    let mut writer = ExportWriter::create(&args.output, &descriptor)?;
    let mut rows = 0u64;
    if kind == RecordKind::Patient {
        for patient in read_patients(&args.input)? {
            writer.write_patient(&patient, &registry, &descriptor)?;
            rows += 1;
        }
    } else {
        for episode in EncodedReader::open(&args.input, kind)? {
            writer.write_episode(&episode?, &registry, &descriptor)?;
            rows += 1;
        }
    }
    writer.finish()?;
    info!(kind = %kind, rows, path = %args.output.display(), "export written");
    Ok(())
}

/// Run the validation pass over every supplied input, then hand each clean
/// file to `consume` with a descriptor carrying the established format.
fn scan_inputs(
    input: &InputArgs,
    mut consume: impl FnMut(RecordKind, &Path, &InputDescriptor) -> Result<()>,
) -> Result<RunSummary> {
    let delimiter = parse_delimiter(&input.delimiter)?;
    let mut outcomes = Vec::new();
    let mut failed = false;

    for (kind, path) in input_files(input) {
        let mut descriptor = InputDescriptor::new(kind).with_delimiter(delimiter);
        if let Some(format) = date_format_of(input.date_format) {
            descriptor = descriptor.with_date_format(format);
        }
        if input.subset {
            descriptor = descriptor.with_subset();
        }
        let validator =
            LineValidator::new(descriptor.clone()).with_max_errors(input.max_errors);

        info!(kind = %kind, path = %path.display(), "scanning");
        let result = match validator.scan_path(&path) {
            Ok(report) => {
                for line in &report.errors {
                    warn!(kind = %kind, "{line}");
                }
                if report.failed() {
                    error!(kind = %kind, path = %path.display(), "file failed validation");
                    failed = true;
                } else {
                    descriptor.date_format = report
                        .date_format
                        .or(descriptor.date_format)
                        .or(Some(DateFormat::DayMonthYear));
                    consume(kind, &path, &descriptor)?;
                }
                FileResult::Report(report)
            }
            Err(fatal @ ScanError::DateFormatConflict { .. }) => {
                error!(kind = %kind, path = %path.display(), "{fatal}");
                failed = true;
                FileResult::Fatal(fatal.to_string())
            }
            Err(ScanError::Io(error)) => {
                return Err(error.context(format!("scan {}", path.display())));
            }
        };
        let outcome = FileOutcome {
            kind,
            path: path.clone(),
            result,
        };
        let patients_failed = kind == RecordKind::Patient && outcome.failed();
        outcomes.push(outcome);
        if patients_failed {
            error!("patients file failed, aborting the run");
            break;
        }
    }

    Ok(RunSummary { outcomes, failed })
}

fn input_files(input: &InputArgs) -> Vec<(RecordKind, PathBuf)> {
    let mut files = vec![(RecordKind::Patient, input.patients.clone())];
    if let Some(path) = &input.events {
        files.push((RecordKind::Event, path.clone()));
    }
    if let Some(path) = &input.prescriptions {
        files.push((RecordKind::Prescription, path.clone()));
    }
    if let Some(path) = &input.measurements {
        files.push((RecordKind::Measurement, path.clone()));
    }
    files
}

fn parse_delimiter(raw: &str) -> Result<char> {
    match raw {
        "tab" | "\\t" => Ok('\t'),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => bail!("delimiter must be a single character, got '{raw}'"),
            }
        }
    }
}

fn date_format_of(arg: DateFormatArg) -> Option<DateFormat> {
    match arg {
        DateFormatArg::Auto => None,
        DateFormatArg::Dmy => Some(DateFormat::DayMonthYear),
        DateFormatArg::Mdy => Some(DateFormat::MonthDayYear),
        DateFormatArg::Ymd => Some(DateFormat::YearMonthDay),
    }
}

fn standard_tables() -> [&'static str; 4] {
    [
        tables::EVENT_TYPES,
        tables::ATC,
        tables::MEASUREMENT_TYPES,
        tables::MEASUREMENT_VALUES,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_parse() {
        assert_eq!(parse_delimiter(",").unwrap(), ',');
        assert_eq!(parse_delimiter(";").unwrap(), ';');
        assert_eq!(parse_delimiter("tab").unwrap(), '\t');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }
}
