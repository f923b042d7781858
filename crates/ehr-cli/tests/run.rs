//! End-to-end runs of the validate and encode drivers.

use std::fs;
use std::path::Path;

use ehr_cli::cli::{DateFormatArg, EncodeArgs, InputArgs, ValidateArgs};
use ehr_cli::commands::{FileResult, run_encode, run_validate};

fn input_args(dir: &Path) -> InputArgs {
    InputArgs {
        patients: dir.join("patients.csv"),
        events: Some(dir.join("events.csv")),
        prescriptions: None,
        measurements: None,
        delimiter: ",".to_string(),
        date_format: DateFormatArg::Auto,
        subset: false,
        max_errors: 100,
    }
}

fn write_small_study(dir: &Path) {
    fs::write(
        dir.join("patients.csv"),
        "PatientID,Birthdate,Gender,Startdate,Enddate\n\
         1,1944-12-01,F,2000-01-01,2016-01-01\n\
         2,1950-06-15,M,2001-01-01,2015-01-01\n",
    )
    .unwrap();
    fs::write(
        dir.join("events.csv"),
        "PatientID,Date,EventType\n\
         1,2008-01-05,MI\n\
         1,2009-03-01,STROKE\n\
         2,2010-06-01,MI\n",
    )
    .unwrap();
}

#[test]
fn validate_then_encode_a_clean_study() {
    let dir = tempfile::tempdir().unwrap();
    write_small_study(dir.path());

    let summary = run_validate(&ValidateArgs {
        input: input_args(dir.path()),
        report_json: Some(dir.path().join("report.json")),
    })
    .unwrap();
    assert!(!summary.failed);
    assert_eq!(summary.outcomes.len(), 2);
    let report_json = fs::read_to_string(dir.path().join("report.json")).unwrap();
    assert!(report_json.contains("\"records_accepted\": 3"));

    let out = dir.path().join("out");
    let summary = run_encode(&EncodeArgs {
        input: input_args(dir.path()),
        output_dir: out.clone(),
        lookup_dir: None,
    })
    .unwrap();
    assert!(!summary.failed);

    let patients = fs::read_to_string(out.join("patients.dat")).unwrap();
    assert_eq!(patients.lines().count(), 2);
    // subset,id,birthdate,gender,startdate,enddate
    assert!(patients.starts_with("0,1,"));

    let events = fs::read_to_string(out.join("events.dat")).unwrap();
    assert_eq!(events.lines().count(), 3);

    // Lookup file: one value per line, line N = index N-1.
    let event_types = fs::read_to_string(out.join("lookups/eventtypes.txt")).unwrap();
    assert_eq!(event_types, "MI\nSTROKE\n");
}

#[test]
fn malformed_patients_file_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // Header only: the patients file must contain data rows.
    fs::write(
        dir.path().join("patients.csv"),
        "PatientID,Birthdate,Gender,Startdate,Enddate\n",
    )
    .unwrap();
    write_events_only(dir.path());

    let summary = run_validate(&ValidateArgs {
        input: input_args(dir.path()),
        report_json: None,
    })
    .unwrap();
    assert!(summary.failed);
    // The run aborts before touching the events file.
    assert_eq!(summary.outcomes.len(), 1);
}

#[test]
fn mixed_date_formats_surface_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("patients.csv"),
        "PatientID,Birthdate,Gender,Startdate,Enddate\n\
         1,1944-12-01,F,2000-01-01,2016-01-01\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("events.csv"),
        "PatientID,Date,EventType\n\
         1,2008-01-05,MI\n\
         1,31-12-2009,STROKE\n",
    )
    .unwrap();

    let summary = run_validate(&ValidateArgs {
        input: input_args(dir.path()),
        report_json: None,
    })
    .unwrap();
    assert!(summary.failed);
    assert!(matches!(summary.outcomes[1].result, FileResult::Fatal(_)));
}

fn write_events_only(dir: &Path) {
    fs::write(
        dir.join("events.csv"),
        "PatientID,Date,EventType\n1,2008-01-05,MI\n",
    )
    .unwrap();
}
