//! Append-only bidirectional lookup tables.
//!
//! A [`LookupTable`] maps a raw categorical value to a small non-negative
//! index and back. Indices are assigned in first-seen order and are never
//! reused or renumbered; values are normalized (trim + ASCII uppercase)
//! before lookup so `" aspirin "` and `"ASPIRIN"` share one index.
//!
//! Interning returns an [`Interned`] event carrying an `inserted` flag;
//! the caller decides whether a grown table needs to be persisted. The
//! registry itself never performs IO.

use std::collections::{BTreeMap, HashMap};

/// Wire sentinel for an absent numeric field. Lookup indices start at 0,
/// so the sentinel can never collide with a valid index.
pub const NO_DATA: i32 = -1;

/// Marker string rendered for the sentinel in human-readable output.
pub const NO_DATA_LABEL: &str = "NO DATA";

/// Canonical table names for the per-kind type registries.
pub mod tables {
    pub const EVENT_TYPES: &str = "EVENTTYPES";
    pub const ATC: &str = "ATC";
    pub const MEASUREMENT_TYPES: &str = "MEASUREMENTTYPES";
    pub const MEASUREMENT_VALUES: &str = "MEASUREMENTVALUES";
}

/// Normalization applied to every value before lookup.
pub fn normalize(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

/// Result of an intern call: the index, and whether the table grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interned {
    pub index: usize,
    pub inserted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    values: Vec<String>,
    index: HashMap<String, usize>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `value`, appending it when unseen.
    pub fn intern(&mut self, value: &str) -> Interned {
        let key = normalize(value);
        if let Some(&index) = self.index.get(&key) {
            return Interned {
                index,
                inserted: false,
            };
        }
        let index = self.values.len();
        self.index.insert(key.clone(), index);
        self.values.push(key);
        Interned {
            index,
            inserted: true,
        }
    }

    /// Index of an already-interned value, without growing the table.
    pub fn get(&self, value: &str) -> Option<usize> {
        self.index.get(&normalize(value)).copied()
    }

    /// Inverse lookup.
    pub fn resolve(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Inverse lookup for wire values: the sentinel and out-of-range
    /// indices both render as the fixed no-data marker.
    pub fn label(&self, index: i32) -> &str {
        if index < 0 {
            return NO_DATA_LABEL;
        }
        self.resolve(index as usize).unwrap_or(NO_DATA_LABEL)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in index order (line N of a lookup file holds index N-1).
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Named collection of lookup tables, one per compressed column.
///
/// A registry has a single logical writer per run; passing it as
/// `&mut LookupRegistry` into every constructor makes that rule an
/// ownership fact rather than a convention.
#[derive(Debug, Clone, Default)]
pub struct LookupRegistry {
    tables: BTreeMap<String, LookupTable>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&LookupTable> {
        self.tables.get(name)
    }

    /// Fetch a table, creating it on first use.
    pub fn table_mut(&mut self, name: &str) -> &mut LookupTable {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn intern(&mut self, table: &str, value: &str) -> Interned {
        self.table_mut(table).intern(value)
    }

    pub fn resolve(&self, table: &str, index: usize) -> Option<&str> {
        self.tables.get(table)?.resolve(index)
    }

    /// Inverse lookup with the no-data fallback.
    pub fn label(&self, table: &str, index: i32) -> &str {
        match self.tables.get(table) {
            Some(t) => t.label(index),
            None => NO_DATA_LABEL,
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &LookupTable)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }
}
