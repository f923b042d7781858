//! Kind-specific line checks.
//!
//! [`attributes_ok`] runs after the structural checks (column count, date
//! format) and decides whether one line is fit for the codec: identifiers
//! present, dates legal and coherent, the kind's extra fields well formed,
//! and any column the driving workflow flagged as numeric-for-this-type
//! actually numeric. Failures come back as plain reason strings; the scan
//! turns them into the error-channel format and keeps going.

use std::collections::BTreeMap;

use ehr_model::dates::{DateFormat, parse_date};
use ehr_model::{InputDescriptor, RecordKind};

use crate::scalar;

/// Type -> columns that must hold numeric values for that type, supplied
/// by the driving workflow (e.g. `BMI -> [Value]`).
#[derive(Debug, Clone, Default)]
pub struct NumericRequirements {
    by_type: BTreeMap<String, Vec<String>>,
}

impl NumericRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, type_value: &str, column: &str) {
        self.by_type
            .entry(type_value.trim().to_ascii_uppercase())
            .or_default()
            .push(column.to_string());
    }

    pub fn columns_for(&self, type_value: &str) -> &[String] {
        self.by_type
            .get(&type_value.trim().to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// The parts of an accepted line the scan keeps tracking with.
#[derive(Debug, Clone)]
pub struct AcceptedLine {
    pub patient_id: String,
    pub subset_id: String,
    /// Day offset used for the first/last-date counters (the observation
    /// start for patients, the episode date otherwise).
    pub date: i32,
    pub type_value: String,
}

/// Validate one line of the given kind. `Err` carries the human-readable
/// reason; the line is then skipped, never fatal.
pub fn attributes_ok(
    columns: &[String],
    descriptor: &InputDescriptor,
    format: DateFormat,
    numeric: &NumericRequirements,
) -> Result<AcceptedLine, String> {
    let field = |logical: usize| descriptor.column(columns, logical).unwrap_or_default();

    let patient_id = field(0).trim();
    if patient_id.is_empty() {
        return Err("no patient ID".to_string());
    }

    let date = |logical: usize, what: &str| {
        parse_date(field(logical), format, descriptor.bounds)
            .map_err(|error| format!("illegal {what}: {error}"))
    };

    let accepted = match descriptor.kind {
        RecordKind::Patient => {
            let birth_date = date(1, "birthdate")?;
            if !scalar::check_gender(field(2)).is_valid() {
                return Err(format!("invalid gender '{}'", field(2)));
            }
            let start_date = date(3, "start date")?;
            let end_date = date(4, "end date")?;
            if birth_date > start_date {
                return Err("birthdate after start of observation".to_string());
            }
            if end_date < start_date {
                return Err("end of observation before its start".to_string());
            }
            AcceptedLine {
                patient_id: patient_id.to_string(),
                subset_id: descriptor.subset(columns).to_string(),
                date: start_date,
                type_value: String::new(),
            }
        }
        RecordKind::Event => {
            let event_date = date(1, "date")?;
            let event_type = field(2).trim();
            if event_type.is_empty() {
                return Err("no event type".to_string());
            }
            AcceptedLine {
                patient_id: patient_id.to_string(),
                subset_id: descriptor.subset(columns).to_string(),
                date: event_date,
                type_value: event_type.to_string(),
            }
        }
        RecordKind::Prescription => {
            let prescription_date = date(1, "date")?;
            let atc = field(2).trim();
            if !scalar::is_valid_atc(atc) {
                return Err(format!("invalid ATC code '{atc}'"));
            }
            if !scalar::is_valid_duration(field(3)) {
                return Err(format!("invalid duration '{}'", field(3)));
            }
            AcceptedLine {
                patient_id: patient_id.to_string(),
                subset_id: descriptor.subset(columns).to_string(),
                date: prescription_date,
                type_value: atc.to_string(),
            }
        }
        RecordKind::Measurement => {
            let measurement_date = date(1, "date")?;
            let measurement_type = field(2).trim();
            if measurement_type.is_empty() {
                return Err("no measurement type".to_string());
            }
            AcceptedLine {
                patient_id: patient_id.to_string(),
                subset_id: descriptor.subset(columns).to_string(),
                date: measurement_date,
                type_value: measurement_type.to_string(),
            }
        }
    };

    check_numeric_requirements(columns, descriptor, numeric, &accepted.type_value)?;
    Ok(accepted)
}

fn check_numeric_requirements(
    columns: &[String],
    descriptor: &InputDescriptor,
    numeric: &NumericRequirements,
    type_value: &str,
) -> Result<(), String> {
    for column_name in numeric.columns_for(type_value) {
        let Some(value) = find_column(columns, descriptor, column_name) else {
            return Err(format!("required numeric column '{column_name}' not present"));
        };
        if !scalar::is_numeric(value) {
            return Err(format!(
                "non-numeric value '{value}' in column '{column_name}' for type '{type_value}'"
            ));
        }
    }
    Ok(())
}

/// Look a column up by header name, mandatory set first, then the
/// extended columns. Case-insensitive.
fn find_column<'a>(
    columns: &'a [String],
    descriptor: &InputDescriptor,
    name: &str,
) -> Option<&'a str> {
    let mandatory = descriptor.kind.mandatory_columns();
    if let Some(logical) = mandatory.iter().position(|c| c.eq_ignore_ascii_case(name)) {
        return descriptor.column(columns, logical);
    }
    descriptor
        .extended
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .and_then(|c| columns.get(c.index))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_model::ExtendedColumn;

    fn columns(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn descriptor(kind: RecordKind) -> InputDescriptor {
        InputDescriptor::new(kind)
    }

    #[test]
    fn patient_checks_cover_dates_and_gender() {
        let d = descriptor(RecordKind::Patient);
        let fmt = DateFormat::YearMonthDay;
        let nr = NumericRequirements::new();

        let good = columns(&["p1", "1944-12-01", "F", "2000-01-01", "2016-01-01"]);
        assert!(attributes_ok(&good, &d, fmt, &nr).is_ok());

        let no_id = columns(&["", "1944-12-01", "F", "2000-01-01", "2016-01-01"]);
        assert_eq!(attributes_ok(&no_id, &d, fmt, &nr).unwrap_err(), "no patient ID");

        let bad_gender = columns(&["p1", "1944-12-01", "Q", "2000-01-01", "2016-01-01"]);
        assert!(attributes_ok(&bad_gender, &d, fmt, &nr)
            .unwrap_err()
            .contains("invalid gender"));

        let born_late = columns(&["p1", "2001-12-01", "F", "2000-01-01", "2016-01-01"]);
        assert!(attributes_ok(&born_late, &d, fmt, &nr)
            .unwrap_err()
            .contains("birthdate after"));

        let ends_early = columns(&["p1", "1944-12-01", "F", "2016-01-01", "2000-01-01"]);
        assert!(attributes_ok(&ends_early, &d, fmt, &nr)
            .unwrap_err()
            .contains("before its start"));
    }

    #[test]
    fn prescription_checks_atc_and_duration() {
        let d = descriptor(RecordKind::Prescription);
        let fmt = DateFormat::YearMonthDay;
        let nr = NumericRequirements::new();

        let good = columns(&["p1", "2015-12-20", "B01AC06", "20"]);
        assert!(attributes_ok(&good, &d, fmt, &nr).is_ok());

        let bad_atc = columns(&["p1", "2015-12-20", "0X", "20"]);
        assert!(attributes_ok(&bad_atc, &d, fmt, &nr)
            .unwrap_err()
            .contains("invalid ATC"));

        let bad_duration = columns(&["p1", "2015-12-20", "B01AC06", "-3"]);
        assert!(attributes_ok(&bad_duration, &d, fmt, &nr)
            .unwrap_err()
            .contains("invalid duration"));
    }

    #[test]
    fn measurement_accepts_blank_value_but_enforces_numeric_table() {
        let d = descriptor(RecordKind::Measurement);
        let fmt = DateFormat::YearMonthDay;
        let mut nr = NumericRequirements::new();
        nr.require("BMI", "Value");

        let blank = columns(&["p1", "2015-12-20", "WEIGHTGROUP", ""]);
        assert!(attributes_ok(&blank, &d, fmt, &nr).is_ok());

        let good = columns(&["p1", "2015-12-20", "bmi", "27.4"]);
        assert!(attributes_ok(&good, &d, fmt, &nr).is_ok());

        let bad = columns(&["p1", "2015-12-20", "BMI", "high"]);
        assert!(attributes_ok(&bad, &d, fmt, &nr)
            .unwrap_err()
            .contains("non-numeric"));
    }

    #[test]
    fn numeric_requirements_reach_extended_columns() {
        let d = descriptor(RecordKind::Event)
            .with_extended(vec![ExtendedColumn::raw("Severity", 3)]);
        let fmt = DateFormat::YearMonthDay;
        let mut nr = NumericRequirements::new();
        nr.require("MI", "Severity");

        let good = columns(&["p1", "2015-12-20", "MI", "3"]);
        assert!(attributes_ok(&good, &d, fmt, &nr).is_ok());

        let bad = columns(&["p1", "2015-12-20", "MI", "severe"]);
        assert!(attributes_ok(&bad, &d, fmt, &nr).is_err());

        // Other types are not constrained.
        let other = columns(&["p1", "2015-12-20", "STROKE", "severe"]);
        assert!(attributes_ok(&other, &d, fmt, &nr).is_ok());
    }
}
