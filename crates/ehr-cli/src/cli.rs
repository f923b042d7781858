//! CLI argument definitions for the extract compactor.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use ehr_model::RecordKind;

#[derive(Parser)]
#[command(
    name = "ehr-compactor",
    version,
    about = "Validate and compact flat health-record extracts",
    long_about = "Validate flat tabular health-record extracts (patients, clinical \n\
                  events, drug prescriptions, measurements) and compress each \n\
                  patient's rows into the compact per-patient encoded store."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan the input files and report every rejected line.
    Validate(ValidateArgs),

    /// Validate, then compress accepted lines into the encoded store.
    Encode(EncodeArgs),

    /// Decode an encoded store file back to analysis-ready CSV.
    Export(ExportArgs),
}

#[derive(Args)]
pub struct InputArgs {
    /// Patient demographics extract (mandatory backbone of a run).
    #[arg(long, value_name = "FILE")]
    pub patients: PathBuf,

    /// Clinical events extract.
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Drug prescriptions extract.
    #[arg(long, value_name = "FILE")]
    pub prescriptions: Option<PathBuf>,

    /// Measurements extract.
    #[arg(long, value_name = "FILE")]
    pub measurements: Option<PathBuf>,

    /// Field delimiter: `,`, `;`, `tab`, or any single character.
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Date component ordering; `auto` detects it from the data.
    #[arg(long = "date-format", value_enum, default_value = "auto")]
    pub date_format: DateFormatArg,

    /// Inputs carry a trailing subset-id column.
    #[arg(long)]
    pub subset: bool,

    /// Recoverable-error budget per file before a scan is abandoned.
    #[arg(long = "max-errors", default_value_t = ehr_validate::MAX_ERRORS)]
    pub max_errors: usize,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the machine-readable scan reports to this JSON file.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Args)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Directory for the encoded per-kind store files.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Directory for the append-only lookup files
    /// (default: <OUTPUT_DIR>/lookups).
    #[arg(long = "lookup-dir", value_name = "DIR")]
    pub lookup_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Record kind stored in the input file.
    #[arg(long, value_enum)]
    pub kind: RecordKindArg,

    /// Encoded store file to decode.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Directory holding the lookup files written by `encode`.
    #[arg(long = "lookup-dir", value_name = "DIR")]
    pub lookup_dir: PathBuf,

    /// Output CSV path.
    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateFormatArg {
    Auto,
    Dmy,
    Mdy,
    Ymd,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RecordKindArg {
    Patients,
    Events,
    Prescriptions,
    Measurements,
}

impl RecordKindArg {
    pub fn to_kind(self) -> RecordKind {
        match self {
            RecordKindArg::Patients => RecordKind::Patient,
            RecordKindArg::Events => RecordKind::Event,
            RecordKindArg::Prescriptions => RecordKind::Prescription,
            RecordKindArg::Measurements => RecordKind::Measurement,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
