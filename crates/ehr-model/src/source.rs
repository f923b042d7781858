//! Input file descriptors.
//!
//! Raw extracts are delimited text with a header row. Columns may appear in
//! any physical order; an explicit data-order mapping from logical column to
//! physical index is supplied per file. A trailing subset-id column and
//! extra extended-attribute columns beyond the mandatory set are optional.

use serde::{Deserialize, Serialize};

use crate::dates::{DateBounds, DateFormat};

/// Subset id assumed when the source carries no subset column.
pub const DEFAULT_SUBSET: &str = "0";

/// The four record kinds an extract can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Patient,
    Event,
    Prescription,
    Measurement,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Patient => "patients",
            RecordKind::Event => "events",
            RecordKind::Prescription => "prescriptions",
            RecordKind::Measurement => "measurements",
        }
    }

    /// Mandatory logical columns, in canonical data-definition order.
    pub fn mandatory_columns(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Patient => {
                &["PatientID", "Birthdate", "Gender", "Startdate", "Enddate"]
            }
            RecordKind::Event => &["PatientID", "Date", "EventType"],
            RecordKind::Prescription => &["PatientID", "Date", "ATC", "Duration"],
            RecordKind::Measurement => &["PatientID", "Date", "MeasurementType", "Value"],
        }
    }

    /// Whether an extract of this kind may contain zero data rows.
    /// The patients file is the backbone of a run; the others are optional.
    pub fn may_be_empty(&self) -> bool {
        !matches!(self, RecordKind::Patient)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extra column beyond the mandatory set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedColumn {
    /// Header name of the column.
    pub name: String,
    /// Physical index in the input file.
    pub index: usize,
    /// Lookup table compressing this column; `None` stores values as-is.
    pub lookup_table: Option<String>,
    /// Flush the lookup table to disk as soon as it grows.
    pub write_through: bool,
}

impl ExtendedColumn {
    pub fn raw(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            lookup_table: None,
            write_through: false,
        }
    }

    pub fn compressed(name: impl Into<String>, index: usize, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            lookup_table: Some(table.into()),
            write_through: false,
        }
    }

    pub fn with_write_through(mut self) -> Self {
        self.write_through = true;
        self
    }
}

/// Shape of one raw input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub kind: RecordKind,
    /// Field delimiter: comma, semicolon, tab, or custom.
    pub delimiter: char,
    /// Established day/month/year ordering; `None` until detection settles.
    pub date_format: Option<DateFormat>,
    /// Logical mandatory column -> physical index. Identity when empty.
    pub data_order: Vec<usize>,
    pub extended: Vec<ExtendedColumn>,
    pub has_subset: bool,
    pub bounds: DateBounds,
}

impl InputDescriptor {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            delimiter: ',',
            date_format: None,
            data_order: Vec::new(),
            extended: Vec::new(),
            has_subset: false,
            bounds: DateBounds::default(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = Some(format);
        self
    }

    pub fn with_data_order(mut self, order: Vec<usize>) -> Self {
        self.data_order = order;
        self
    }

    pub fn with_extended(mut self, columns: Vec<ExtendedColumn>) -> Self {
        self.extended = columns;
        self
    }

    pub fn with_subset(mut self) -> Self {
        self.has_subset = true;
        self
    }

    pub fn with_bounds(mut self, bounds: DateBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Column count every data line must have.
    pub fn expected_columns(&self) -> usize {
        self.kind.mandatory_columns().len()
            + self.extended.len()
            + usize::from(self.has_subset)
    }

    /// Physical index of a logical mandatory column.
    pub fn physical(&self, logical: usize) -> usize {
        self.data_order.get(logical).copied().unwrap_or(logical)
    }

    /// Fetch a mandatory column value from a split line.
    pub fn column<'a>(&self, columns: &'a [String], logical: usize) -> Option<&'a str> {
        columns.get(self.physical(logical)).map(String::as_str)
    }

    /// Physical index of the trailing subset column.
    pub fn subset_index(&self) -> usize {
        self.kind.mandatory_columns().len() + self.extended.len()
    }

    /// Subset id of a line, falling back to the default subset.
    pub fn subset<'a>(&self, columns: &'a [String]) -> &'a str {
        if self.has_subset
            && let Some(value) = columns.get(self.subset_index())
        {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        DEFAULT_SUBSET
    }

    /// Physical indices of the date columns of this kind (birth/start/end
    /// for patients, the single episode date otherwise).
    pub fn date_columns(&self) -> Vec<usize> {
        match self.kind {
            RecordKind::Patient => vec![self.physical(1), self.physical(3), self.physical(4)],
            _ => vec![self.physical(1)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_columns_counts_subset_and_extended() {
        let plain = InputDescriptor::new(RecordKind::Event);
        assert_eq!(plain.expected_columns(), 3);

        let rich = InputDescriptor::new(RecordKind::Event)
            .with_extended(vec![ExtendedColumn::raw("Code", 3)])
            .with_subset();
        assert_eq!(rich.expected_columns(), 5);
        assert_eq!(rich.subset_index(), 4);
    }

    #[test]
    fn data_order_remaps_columns() {
        let descriptor = InputDescriptor::new(RecordKind::Event).with_data_order(vec![2, 0, 1]);
        let line = vec!["20080101".to_string(), "MI".to_string(), "p1".to_string()];
        assert_eq!(descriptor.column(&line, 0), Some("p1"));
        assert_eq!(descriptor.column(&line, 1), Some("20080101"));
        assert_eq!(descriptor.column(&line, 2), Some("MI"));
    }

    #[test]
    fn subset_defaults_when_absent_or_blank() {
        let descriptor = InputDescriptor::new(RecordKind::Event).with_subset();
        let line = vec![
            "p1".to_string(),
            "20080101".to_string(),
            "MI".to_string(),
            " ".to_string(),
        ];
        assert_eq!(descriptor.subset(&line), DEFAULT_SUBSET);
        let line = vec![
            "p1".to_string(),
            "20080101".to_string(),
            "MI".to_string(),
            "S2".to_string(),
        ];
        assert_eq!(descriptor.subset(&line), "S2");
    }
}
