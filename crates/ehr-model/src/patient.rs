//! Patient records: demographics, episode collections, cohort intervals,
//! and the derived population/cohort windows.
//!
//! A record is created once from a validated input line (or decoded from
//! the encoded store), may be cloned when a downstream stage needs an
//! independent working copy, and keeps its shape until written back out.
//! The derived windows start equal to the observation window and are only
//! ever moved by downstream modifiers, never by the codec.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dates::{self, parse_date};
use crate::episode::{Episode, ExtendedValue};
use crate::error::{ModelError, Result};
use crate::gender::Gender;
use crate::lookup::{LookupRegistry, NO_DATA};
use crate::source::{InputDescriptor, RecordKind};

/// Label rendered when no cohort covers a query date.
pub const NO_COHORT_LABEL: &str = "None";

/// A named `[start, end)` interval within a patient's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_type: String,
    pub start: i32,
    pub end: i32,
    pub prescriber_id: Option<String>,
    pub prescriber_type: Option<String>,
}

impl Cohort {
    pub fn new(cohort_type: impl Into<String>, start: i32, end: i32) -> Self {
        Self {
            cohort_type: cohort_type.into(),
            start,
            end,
            prescriber_id: None,
            prescriber_type: None,
        }
    }

    pub fn contains(&self, date: i32) -> bool {
        date >= self.start && date < self.end
    }
}

/// One patient's aggregated history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub subset_id: String,
    /// Day offset of the birth date.
    pub birth_date: i32,
    pub gender: Gender,
    /// Observation window `[start_date, end_date)`.
    pub start_date: i32,
    pub end_date: i32,
    pub extended: BTreeMap<usize, ExtendedValue>,
    pub events: Vec<Episode>,
    pub prescriptions: Vec<Episode>,
    pub measurements: Vec<Episode>,
    /// Immutable snapshot of the prescriptions at construction time, used
    /// later to detect modifier-induced changes.
    pub original_prescriptions: Vec<Episode>,
    pub cohorts: Vec<Cohort>,
    pub population_start: i32,
    pub population_end: i32,
    pub in_population: bool,
    pub cohort_start: i32,
    pub cohort_end: i32,
    pub in_cohort: bool,
}

impl Patient {
    /// Build a patient from a validated raw line.
    pub fn from_input(
        columns: &[String],
        descriptor: &InputDescriptor,
        registry: &mut LookupRegistry,
    ) -> Result<Self> {
        if descriptor.kind != RecordKind::Patient {
            return Err(ModelError::MalformedRow(format!(
                "{} descriptor cannot build a patient",
                descriptor.kind
            )));
        }
        let format = descriptor
            .date_format
            .ok_or(ModelError::MissingDateFormat("patients"))?;
        let column = |logical: usize| {
            descriptor
                .column(columns, logical)
                .ok_or(ModelError::MissingColumn {
                    column: RecordKind::Patient.mandatory_columns()[logical],
                    index: descriptor.physical(logical),
                })
        };
        let id = column(0)?.trim().to_string();
        let birth_date = parse_date(column(1)?, format, descriptor.bounds)?;
        let gender = Gender::from_code(column(2)?);
        let start_date = parse_date(column(3)?, format, descriptor.bounds)?;
        let end_date = parse_date(column(4)?, format, descriptor.bounds)?;

        let mut extended = BTreeMap::new();
        for (ordinal, extra) in descriptor.extended.iter().enumerate() {
            let raw = columns
                .get(extra.index)
                .map(|v| v.trim())
                .unwrap_or_default();
            let value = match &extra.lookup_table {
                Some(table) => ExtendedValue::Compressed(registry.intern(table, raw).index),
                None => ExtendedValue::Raw(raw.to_string()),
            };
            extended.insert(ordinal, value);
        }

        Ok(Self::assemble(
            id,
            descriptor.subset(columns).to_string(),
            birth_date,
            gender,
            start_date,
            end_date,
            extended,
        ))
    }

    /// Rebuild a patient from an encoded row:
    /// `subset,id,birthdate,gender,startdate,enddate{,extAttr}*`.
    /// Never touches the registry.
    pub fn from_encoded(fields: &[&str]) -> Result<Self> {
        if fields.len() < 6 {
            return Err(ModelError::MalformedRow(fields.join(",")));
        }
        let wire_int = |field: &str| -> Result<i32> {
            field
                .trim()
                .parse()
                .map_err(|_| ModelError::InvalidNumber(field.trim().to_string()))
        };
        let mut extended = BTreeMap::new();
        for (ordinal, field) in fields[6..].iter().enumerate() {
            extended.insert(ordinal, ExtendedValue::Raw(field.trim().to_string()));
        }
        Ok(Self::assemble(
            fields[1].trim().to_string(),
            fields[0].trim().to_string(),
            wire_int(fields[2])?,
            Gender::from_wire(wire_int(fields[3])?),
            wire_int(fields[4])?,
            wire_int(fields[5])?,
            extended,
        ))
    }

    fn assemble(
        id: String,
        subset_id: String,
        birth_date: i32,
        gender: Gender,
        start_date: i32,
        end_date: i32,
        extended: BTreeMap<usize, ExtendedValue>,
    ) -> Self {
        Self {
            id,
            subset_id,
            birth_date,
            gender,
            start_date,
            end_date,
            extended,
            events: Vec::new(),
            prescriptions: Vec::new(),
            measurements: Vec::new(),
            original_prescriptions: Vec::new(),
            cohorts: Vec::new(),
            population_start: start_date,
            population_end: end_date,
            in_population: true,
            cohort_start: start_date,
            cohort_end: end_date,
            in_cohort: true,
        }
    }

    /// Attach an episode to the matching collection. Prescriptions are
    /// also snapshotted into the original-prescriptions copy.
    pub fn push_episode(&mut self, episode: Episode) {
        match episode.kind() {
            RecordKind::Event => self.events.push(episode),
            RecordKind::Prescription => {
                self.original_prescriptions.push(episode.clone());
                self.prescriptions.push(episode);
            }
            RecordKind::Measurement => self.measurements.push(episode),
            RecordKind::Patient => {}
        }
    }

    /// Compact row for the on-disk encoded store.
    pub fn to_encoded(&self) -> String {
        let mut fields = vec![
            self.subset_id.clone(),
            self.id.clone(),
            self.birth_date.to_string(),
            self.gender.to_wire().to_string(),
            self.start_date.to_string(),
            self.end_date.to_string(),
        ];
        for value in self.extended.values() {
            fields.push(match value {
                ExtendedValue::Compressed(index) => index.to_string(),
                ExtendedValue::Raw(raw) => raw.clone(),
            });
        }
        fields.join(",")
    }

    /// Human-readable rendition with 8-digit dates and the gender letter.
    pub fn to_uncompressed(
        &self,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> String {
        self.export_fields(registry, descriptor).join(",")
    }

    /// Fields in the canonical data-definition order.
    pub fn to_export(
        &self,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> Vec<String> {
        self.export_fields(registry, descriptor)
    }

    fn export_fields(
        &self,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> Vec<String> {
        let mut fields = vec![
            self.id.clone(),
            dates::format_date(self.birth_date),
            self.gender.as_code().to_string(),
            dates::format_date(self.start_date),
            dates::format_date(self.end_date),
        ];
        for (ordinal, value) in &self.extended {
            fields.push(match value {
                ExtendedValue::Compressed(index) => {
                    match descriptor
                        .extended
                        .get(*ordinal)
                        .and_then(|c| c.lookup_table.as_deref())
                    {
                        Some(table) => registry.label(table, *index as i32).to_string(),
                        None => index.to_string(),
                    }
                }
                ExtendedValue::Raw(raw) => raw.clone(),
            });
        }
        fields.push(self.subset_id.clone());
        fields
    }

    /// Age in whole days at `date`; `None` before birth.
    pub fn age_days_at(&self, date: i32) -> Option<i32> {
        let days = date - self.birth_date;
        (days >= 0).then_some(days)
    }

    /// Age in completed years at `date`, accounting for whether the query
    /// date falls before or after the calendar birthday of that year.
    pub fn age_years_at(&self, date: i32) -> Option<i32> {
        if date < self.birth_date {
            return None;
        }
        let (birth_year, _, _) = dates::to_ymd(self.birth_date);
        let (year, _, _) = dates::to_ymd(date);
        let mut age = year - birth_year;
        if date < self.birthday_in_year(year) {
            age -= 1;
        }
        Some(age)
    }

    /// Day offset of the patient's birthday in the given calendar year.
    /// A February 29 birthday shifts to March 1 in non-leap years.
    pub fn birthday_in_year(&self, year: i32) -> i32 {
        let (_, month, day) = dates::to_ymd(self.birth_date);
        if month == 2 && day == 29 && !dates::is_leap_year(year) {
            dates::from_ymd(year, 3, 1)
        } else {
            dates::from_ymd(year, month, day)
        }
    }

    /// Fractional age in years at `date` using the leap-aware day-count
    /// method: each year of life runs birthday to birthday and contributes
    /// its days to a 365-day or a 366-day bucket depending on whether that
    /// year spans a leap day; the final age is
    /// `days365 / 365.0 + days366 / 366.0`.
    pub fn fractional_age_at(&self, date: i32) -> f64 {
        if date <= self.birth_date {
            return 0.0;
        }
        let (birth_year, _, _) = dates::to_ymd(self.birth_date);
        let mut days_365 = 0i64;
        let mut days_366 = 0i64;
        let mut span_start = self.birth_date;
        let mut year = birth_year;
        loop {
            let span_end = self.birthday_in_year(year + 1);
            let span_days = (span_end - span_start) as i64;
            let leap_span = span_days == 366;
            if date >= span_end {
                if leap_span {
                    days_366 += span_days;
                } else {
                    days_365 += span_days;
                }
            } else {
                let partial = (date - span_start) as i64;
                if leap_span {
                    days_366 += partial;
                } else {
                    days_365 += partial;
                }
                break;
            }
            span_start = span_end;
            year += 1;
        }
        days_365 as f64 / 365.0 + days_366 as f64 / 366.0
    }

    /// Days of patient time falling inside the given calendar year,
    /// clipped to the observation window.
    pub fn patient_time_in_year(&self, year: i32) -> i32 {
        let year_start = dates::from_ymd(year, 1, 1);
        let year_end = dates::from_ymd(year + 1, 1, 1);
        let lo = self.start_date.max(year_start);
        let hi = self.end_date.min(year_end);
        (hi - lo).max(0)
    }

    /// First cohort covering `date`, scanning in list order.
    pub fn cohort_at(&self, date: i32) -> Option<&Cohort> {
        self.cohorts.iter().find(|c| c.contains(date))
    }

    pub fn cohort_type_at(&self, date: i32) -> Option<&str> {
        self.cohort_at(date).map(|c| c.cohort_type.as_str())
    }

    pub fn cohort_start_at(&self, date: i32) -> Option<i32> {
        self.cohort_at(date).map(|c| c.start)
    }

    /// 1-based position of the covering cohort in the list.
    pub fn cohort_sequence_number_at(&self, date: i32) -> Option<usize> {
        self.cohorts
            .iter()
            .position(|c| c.contains(date))
            .map(|i| i + 1)
    }

    /// Wire renditions of the cohort queries, used at the serialization
    /// boundary only.
    pub fn cohort_type_label_at(&self, date: i32) -> &str {
        self.cohort_type_at(date).unwrap_or(NO_COHORT_LABEL)
    }

    pub fn cohort_start_wire_at(&self, date: i32) -> i32 {
        self.cohort_start_at(date).unwrap_or(NO_DATA)
    }

    pub fn cohort_sequence_wire_at(&self, date: i32) -> i32 {
        self.cohort_sequence_number_at(date)
            .map_or(NO_DATA, |n| n as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{DateFormat, from_ymd};

    fn patient(birth: (i32, u32, u32), start: (i32, u32, u32), end: (i32, u32, u32)) -> Patient {
        Patient::assemble(
            "p1".to_string(),
            "0".to_string(),
            from_ymd(birth.0, birth.1, birth.2),
            Gender::Female,
            from_ymd(start.0, start.1, start.2),
            from_ymd(end.0, end.1, end.2),
            BTreeMap::new(),
        )
    }

    #[test]
    fn from_input_parses_and_defaults_windows() {
        let mut registry = LookupRegistry::new();
        let descriptor =
            InputDescriptor::new(RecordKind::Patient).with_date_format(DateFormat::YearMonthDay);
        let columns: Vec<String> = ["p1", "1944-12-01", "F", "2000-01-01", "2016-01-01"]
            .iter()
            .map(|v| (*v).to_string())
            .collect();
        let patient = Patient::from_input(&columns, &descriptor, &mut registry).unwrap();
        assert_eq!(patient.birth_date, from_ymd(1944, 12, 1));
        assert_eq!(patient.gender, Gender::Female);
        assert_eq!(patient.population_start, patient.start_date);
        assert_eq!(patient.population_end, patient.end_date);
        assert!(patient.in_population);
        assert!(patient.in_cohort);
        assert!(patient.original_prescriptions.is_empty());
    }

    #[test]
    fn encoded_round_trip() {
        let p = patient((1944, 12, 1), (2000, 1, 1), (2016, 1, 1));
        let row = p.to_encoded();
        let fields: Vec<&str> = row.split(',').collect();
        let decoded = Patient::from_encoded(&fields).unwrap();
        assert_eq!(decoded.id, p.id);
        assert_eq!(decoded.birth_date, p.birth_date);
        assert_eq!(decoded.gender, p.gender);
        assert_eq!(decoded.end_date, p.end_date);
        assert_eq!(decoded.to_encoded(), row);
    }

    #[test]
    fn age_in_days_clamps_before_birth() {
        let p = patient((2000, 1, 1), (2000, 1, 1), (2016, 1, 1));
        assert_eq!(p.age_days_at(from_ymd(2000, 1, 31)), Some(30));
        assert_eq!(p.age_days_at(from_ymd(1999, 12, 31)), None);
    }

    #[test]
    fn completed_years_respect_the_birthday() {
        let p = patient((1980, 6, 15), (2000, 1, 1), (2016, 1, 1));
        assert_eq!(p.age_years_at(from_ymd(2000, 6, 14)), Some(19));
        assert_eq!(p.age_years_at(from_ymd(2000, 6, 15)), Some(20));
        assert_eq!(p.age_years_at(from_ymd(2000, 6, 16)), Some(20));
    }

    #[test]
    fn fractional_age_is_exact_on_anniversaries() {
        let p = patient((1944, 12, 1), (2000, 1, 1), (2016, 1, 1));
        let age = p.fractional_age_at(from_ymd(2009, 12, 1));
        assert_eq!(age, 65.0);
    }

    #[test]
    fn fractional_age_partial_year() {
        let p = patient((2000, 1, 1), (2000, 1, 1), (2016, 1, 1));
        // 2000 is a leap year, so the first year of life spans 366 days.
        let age = p.fractional_age_at(from_ymd(2000, 1, 1) + 183);
        assert!((age - 183.0 / 366.0).abs() < 1e-12);
    }

    #[test]
    fn leap_birthday_shifts_to_march_first() {
        let p = patient((2000, 2, 29), (2000, 2, 29), (2016, 1, 1));
        assert_eq!(p.birthday_in_year(2001), from_ymd(2001, 3, 1));
        assert_eq!(p.birthday_in_year(2004), from_ymd(2004, 2, 29));
        assert_eq!(p.age_years_at(from_ymd(2001, 2, 28)), Some(0));
        assert_eq!(p.age_years_at(from_ymd(2001, 3, 1)), Some(1));
    }

    #[test]
    fn patient_time_clips_to_observation_window() {
        let p = patient((1980, 1, 1), (2000, 7, 1), (2002, 4, 1));
        assert_eq!(p.patient_time_in_year(1999), 0);
        assert_eq!(
            p.patient_time_in_year(2000),
            from_ymd(2001, 1, 1) - from_ymd(2000, 7, 1)
        );
        assert_eq!(p.patient_time_in_year(2001), 365);
        assert_eq!(
            p.patient_time_in_year(2002),
            from_ymd(2002, 4, 1) - from_ymd(2002, 1, 1)
        );
    }

    #[test]
    fn cohort_queries_scan_linearly() {
        let mut p = patient((1980, 1, 1), (2000, 1, 1), (2016, 1, 1));
        p.cohorts.push(Cohort::new("exposed", 100, 200));
        p.cohorts.push(Cohort::new("washout", 200, 300));
        assert_eq!(p.cohort_type_at(150), Some("exposed"));
        assert_eq!(p.cohort_type_at(200), Some("washout"));
        assert_eq!(p.cohort_type_at(300), None);
        assert_eq!(p.cohort_sequence_number_at(250), Some(2));
        assert_eq!(p.cohort_start_at(150), Some(100));
        assert_eq!(p.cohort_type_label_at(999), NO_COHORT_LABEL);
        assert_eq!(p.cohort_start_wire_at(999), NO_DATA);
        assert_eq!(p.cohort_sequence_wire_at(999), NO_DATA);
    }

    #[test]
    fn push_episode_snapshots_prescriptions() {
        let mut p = patient((1980, 1, 1), (2000, 1, 1), (2016, 1, 1));
        let rx = Episode::from_encoded(
            RecordKind::Prescription,
            &["0", "p1", "0", "100", "30", "0"],
        )
        .unwrap();
        p.push_episode(rx);
        assert_eq!(p.prescriptions.len(), 1);
        assert_eq!(p.original_prescriptions.len(), 1);
        p.prescriptions.clear();
        assert_eq!(p.original_prescriptions.len(), 1);
    }
}
