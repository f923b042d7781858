//! Episode records and their compression codec.
//!
//! An episode is one timestamped clinical fact belonging to a patient: an
//! event, a prescription, or a measurement. The struct carries the shared
//! fields; [`EpisodeDetail`] carries the kind-specific payload.
//!
//! Three construction contracts exist and must not be mixed up:
//!
//! - [`Episode::from_input`] builds a fully compressed record from a raw,
//!   already-validated line: every categorical value is interned into the
//!   registry immediately.
//! - [`Episode::from_encoded`] rebuilds a record from a compact
//!   patient-object row. It parses integers directly and never touches the
//!   registry, so decoding is idempotent.
//! - `Clone` deep-copies the extended attributes for
//!   produce-a-working-copy-before-mutation use.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dates::{self, parse_date};
use crate::error::{ModelError, Result};
use crate::lookup::{LookupRegistry, LookupTable, NO_DATA, tables};
use crate::source::{InputDescriptor, RecordKind};

/// Quoted-empty placeholder some measurement extracts use for "no value".
const QUOTED_EMPTY: &str = "\"\"";

/// An extended-attribute value: compressed through a lookup table, or kept
/// as-is when no lookup column exists for that attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedValue {
    Compressed(usize),
    Raw(String),
}

impl ExtendedValue {
    fn to_field(&self) -> String {
        match self {
            ExtendedValue::Compressed(index) => index.to_string(),
            ExtendedValue::Raw(value) => value.clone(),
        }
    }
}

/// Kind-specific payload of an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EpisodeDetail {
    Event,
    Prescription {
        /// Days covered by the prescription. The wire sentinel is kept for
        /// rows decoded from the encoded store; raw input defaults to 0.
        duration_days: i32,
        /// Start of the combination episode this prescription was merged
        /// into. Defaults to the prescription's own date.
        combination_start: i32,
        /// Whether all components of a combination start on the same day.
        all_components_start: bool,
    },
    Measurement {
        /// Index into the measurement-value table; `None` when the source
        /// had no value.
        value: Option<usize>,
    },
}

/// One clinical fact in compressed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub patient_id: String,
    pub subset_id: String,
    /// Day offset of the episode date.
    pub date: i32,
    /// Index into the kind-specific type table.
    pub type_index: usize,
    /// Declared extended columns, keyed by their ordinal in the descriptor.
    pub extended: BTreeMap<usize, ExtendedValue>,
    pub detail: EpisodeDetail,
}

/// Lookup table compressing the type column of the given kind.
pub fn type_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Event => tables::EVENT_TYPES,
        RecordKind::Prescription => tables::ATC,
        RecordKind::Measurement => tables::MEASUREMENT_TYPES,
        RecordKind::Patient => unreachable!("patients have no type table"),
    }
}

impl Episode {
    pub fn kind(&self) -> RecordKind {
        match self.detail {
            EpisodeDetail::Event => RecordKind::Event,
            EpisodeDetail::Prescription { .. } => RecordKind::Prescription,
            EpisodeDetail::Measurement { .. } => RecordKind::Measurement,
        }
    }

    /// Build a fully compressed episode from a validated raw line.
    pub fn from_input(
        columns: &[String],
        descriptor: &InputDescriptor,
        registry: &mut LookupRegistry,
    ) -> Result<Self> {
        let kind = descriptor.kind;
        if kind == RecordKind::Patient {
            return Err(ModelError::MalformedRow(
                "patient lines build a PatientRecord, not an episode".to_string(),
            ));
        }
        let format = descriptor
            .date_format
            .ok_or(ModelError::MissingDateFormat(kind.as_str()))?;
        let patient_id = mandatory(columns, descriptor, 0)?.trim().to_string();
        let date = parse_date(mandatory(columns, descriptor, 1)?, format, descriptor.bounds)?;
        let type_raw = mandatory(columns, descriptor, 2)?;
        let type_index = registry.intern(type_table(kind), type_raw).index;

        let detail = match kind {
            RecordKind::Event => EpisodeDetail::Event,
            RecordKind::Prescription => {
                let duration_days = parse_duration(mandatory(columns, descriptor, 3)?)?;
                EpisodeDetail::Prescription {
                    duration_days,
                    combination_start: date,
                    all_components_start: false,
                }
            }
            RecordKind::Measurement => {
                let raw = mandatory(columns, descriptor, 3)?.trim();
                let value = if raw.is_empty() || raw == QUOTED_EMPTY {
                    None
                } else {
                    Some(registry.intern(tables::MEASUREMENT_VALUES, raw).index)
                };
                EpisodeDetail::Measurement { value }
            }
            RecordKind::Patient => unreachable!(),
        };

        let mut extended = BTreeMap::new();
        for (ordinal, column) in descriptor.extended.iter().enumerate() {
            let raw = columns
                .get(column.index)
                .map(|v| v.trim())
                .unwrap_or_default();
            let value = match &column.lookup_table {
                Some(table) => ExtendedValue::Compressed(registry.intern(table, raw).index),
                None => ExtendedValue::Raw(raw.to_string()),
            };
            extended.insert(ordinal, value);
        }

        Ok(Self {
            patient_id,
            subset_id: descriptor.subset(columns).to_string(),
            date,
            type_index,
            extended,
            detail,
        })
    }

    /// Rebuild an episode from an encoded patient-object row.
    ///
    /// Field layout (the leading subset column shifts everything by one):
    /// `subset,patientId,type,date[,value|duration]{,extAttr}*[,flag]`.
    /// No registry interaction happens here.
    pub fn from_encoded(kind: RecordKind, fields: &[&str]) -> Result<Self> {
        let base = match kind {
            RecordKind::Event => 4,
            RecordKind::Prescription | RecordKind::Measurement => 5,
            RecordKind::Patient => {
                return Err(ModelError::MalformedRow(
                    "patient rows decode into a PatientRecord".to_string(),
                ));
            }
        };
        let trailer = usize::from(matches!(kind, RecordKind::Prescription));
        if fields.len() < base + trailer {
            return Err(ModelError::MalformedRow(fields.join(",")));
        }

        let subset_id = fields[0].trim().to_string();
        let patient_id = fields[1].trim().to_string();
        let type_index = parse_wire_index(fields[2])? as usize;
        let date = parse_wire_int(fields[3])?;

        let detail = match kind {
            RecordKind::Event => EpisodeDetail::Event,
            RecordKind::Prescription => {
                let duration_days = parse_wire_int(fields[4])?;
                let flag = fields[fields.len() - 1].trim();
                EpisodeDetail::Prescription {
                    duration_days,
                    combination_start: date,
                    all_components_start: flag == "1",
                }
            }
            RecordKind::Measurement => {
                let wire = parse_wire_int(fields[4])?;
                EpisodeDetail::Measurement {
                    value: (wire >= 0).then_some(wire as usize),
                }
            }
            RecordKind::Patient => unreachable!(),
        };

        let mut extended = BTreeMap::new();
        for (ordinal, field) in fields[base..fields.len() - trailer].iter().enumerate() {
            extended.insert(ordinal, ExtendedValue::Raw(field.trim().to_string()));
        }

        Ok(Self {
            patient_id,
            subset_id,
            date,
            type_index,
            extended,
            detail,
        })
    }

    /// Compact row for the on-disk encoded store.
    pub fn to_encoded(&self) -> String {
        self.encoded_fields(self.date.to_string()).join(",")
    }

    /// Compact row with the date rendered as the 8-digit calendar string.
    /// Intermediate debugging exports only.
    pub fn to_converted_date(&self) -> String {
        self.encoded_fields(dates::format_date(self.date)).join(",")
    }

    fn encoded_fields(&self, date_field: String) -> Vec<String> {
        let mut fields = vec![
            self.subset_id.clone(),
            self.patient_id.clone(),
            self.type_index.to_string(),
            date_field,
        ];
        match &self.detail {
            EpisodeDetail::Event => {}
            EpisodeDetail::Prescription { duration_days, .. } => {
                fields.push(duration_days.to_string());
            }
            EpisodeDetail::Measurement { value } => {
                fields.push(value.map_or(NO_DATA, |v| v as i32).to_string());
            }
        }
        for value in self.extended.values() {
            fields.push(value.to_field());
        }
        if let EpisodeDetail::Prescription {
            all_components_start,
            ..
        } = self.detail
        {
            fields.push(i32::from(all_components_start).to_string());
        }
        fields
    }

    /// Human-readable rendition: type and value resolved through the
    /// registry, date as the 8-digit calendar string, extended attributes
    /// resolved where a lookup column exists and kept as-is otherwise.
    pub fn to_uncompressed(
        &self,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> String {
        self.export_fields(registry, descriptor).join(",")
    }

    /// Fields in the canonical data-definition order for the
    /// analysis-ready export.
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
        let kind = self.kind();
        let mut fields = vec![
            self.patient_id.clone(),
            dates::format_date(self.date),
            registry
                .label(type_table(kind), self.type_index as i32)
                .to_string(),
        ];
        match &self.detail {
            EpisodeDetail::Event => {}
            EpisodeDetail::Prescription { duration_days, .. } => {
                fields.push(duration_days.to_string());
            }
            EpisodeDetail::Measurement { value } => {
                let wire = value.map_or(NO_DATA, |v| v as i32);
                fields.push(registry.label(tables::MEASUREMENT_VALUES, wire).to_string());
            }
        }
        for (ordinal, value) in &self.extended {
            let rendered = match value {
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
            };
            fields.push(rendered);
        }
        fields.push(self.subset_id.clone());
        fields
    }

    /// Days covered, for prescriptions with a known duration.
    pub fn duration_days(&self) -> Option<i32> {
        match self.detail {
            EpisodeDetail::Prescription { duration_days, .. } if duration_days >= 0 => {
                Some(duration_days)
            }
            _ => None,
        }
    }

    /// Measurement value index, when present.
    pub fn value_index(&self) -> Option<usize> {
        match self.detail {
            EpisodeDetail::Measurement { value } => value,
            _ => None,
        }
    }

    /// Canonical interval-membership test, parameterized on inclusivity at
    /// both ends. Prescriptions answer for their `[date, date+duration)`
    /// window instead of the point date; a zero or unknown duration
    /// degrades to the point test so a same-day query still matches.
    pub fn is_in_period(
        &self,
        start: i32,
        end: i32,
        include_start: bool,
        include_end: bool,
    ) -> bool {
        let lo = if include_start { start } else { start + 1 };
        let hi = if include_end { end } else { end - 1 };
        if lo > hi {
            return false;
        }
        match self.detail {
            EpisodeDetail::Prescription { duration_days, .. } if duration_days > 0 => {
                self.date <= hi && self.date + duration_days > lo
            }
            _ => self.date >= lo && self.date <= hi,
        }
    }
}

fn mandatory<'a>(
    columns: &'a [String],
    descriptor: &InputDescriptor,
    logical: usize,
) -> Result<&'a str> {
    descriptor
        .column(columns, logical)
        .ok_or(ModelError::MissingColumn {
            column: descriptor.kind.mandatory_columns()[logical],
            index: descriptor.physical(logical),
        })
}

/// Duration fields may carry fractional day counts; they truncate to whole
/// days. Blank means zero.
fn parse_duration(raw: &str) -> Result<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let parsed: f64 = trimmed
        .parse()
        .map_err(|_| ModelError::InvalidNumber(trimmed.to_string()))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(ModelError::InvalidNumber(trimmed.to_string()));
    }
    Ok(parsed.trunc() as i32)
}

fn parse_wire_int(field: &str) -> Result<i32> {
    field
        .trim()
        .parse()
        .map_err(|_| ModelError::InvalidNumber(field.trim().to_string()))
}

fn parse_wire_index(field: &str) -> Result<i32> {
    let value = parse_wire_int(field)?;
    if value < 0 {
        return Err(ModelError::MalformedRow(format!(
            "negative type index {value}"
        )));
    }
    Ok(value)
}

/// Primary episode ordering: by date ascending. Prescriptions sharing a
/// date put the longer duration first.
pub fn cmp_by_date(a: &Episode, b: &Episode) -> Ordering {
    a.date.cmp(&b.date).then_with(|| match (&a.detail, &b.detail) {
        (
            EpisodeDetail::Prescription {
                duration_days: da, ..
            },
            EpisodeDetail::Prescription {
                duration_days: db, ..
            },
        ) => db.cmp(da),
        _ => Ordering::Equal,
    })
}

/// Generic type-string ordering: shorter strings first, then lexicographic.
pub fn cmp_type_strings(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_types(a: &Episode, b: &Episode, types: &LookupTable) -> Ordering {
    cmp_type_strings(
        types.label(a.type_index as i32),
        types.label(b.type_index as i32),
    )
}

/// Date-major ordering with the type string as tie-break.
pub fn cmp_date_then_type(a: &Episode, b: &Episode, types: &LookupTable) -> Ordering {
    cmp_by_date(a, b).then_with(|| cmp_types(a, b, types))
}

/// Type-major ordering with the date as tie-break. The aggregation stage
/// needs both directions.
pub fn cmp_type_then_date(a: &Episode, b: &Episode, types: &LookupTable) -> Ordering {
    cmp_types(a, b, types).then_with(|| cmp_by_date(a, b))
}
