//! Running per-kind scan counters.
//!
//! Updated as a side effect of each scan and read by the external
//! reporting collaborator. Not part of the codec's correctness contract,
//! but kept consistent with what the scan accepted.

use std::collections::HashSet;

use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanStats {
    /// Data lines read (header excluded), accepted or not.
    pub lines_read: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    /// Distinct (normalized) type values among accepted lines.
    pub distinct_types: u64,
    /// Day offsets of the earliest and latest accepted dates.
    pub first_date: Option<i32>,
    pub last_date: Option<i32>,
    #[serde(skip)]
    types_seen: HashSet<String>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, date: i32, type_value: &str) {
        self.records_accepted += 1;
        let normalized = type_value.trim().to_ascii_uppercase();
        if !normalized.is_empty() && self.types_seen.insert(normalized) {
            self.distinct_types += 1;
        }
        self.first_date = Some(self.first_date.map_or(date, |d| d.min(date)));
        self.last_date = Some(self.last_date.map_or(date, |d| d.max(date)));
    }

    pub fn reject(&mut self) {
        self.records_rejected += 1;
    }
}
