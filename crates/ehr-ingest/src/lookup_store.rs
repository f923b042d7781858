//! On-disk persistence for lookup tables.
//!
//! Each table lives in one append-only text file, one raw value per line;
//! line N holds the value for index N-1. Tables registered as
//! write-through are flushed as soon as they grow, so concurrent
//! downstream readers see new codes without waiting for end-of-run.
//!
//! The registry itself performs no IO; the store tracks how many values of
//! each table are already on disk and appends the difference. A disabled
//! store keeps the cursor bookkeeping but skips the filesystem, which is
//! what the tests inject.

use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use ehr_model::LookupRegistry;

pub struct LookupStore {
    dir: PathBuf,
    write_through: BTreeSet<String>,
    flushed: HashMap<String, usize>,
    enabled: bool,
}

impl LookupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_through: BTreeSet::new(),
            flushed: HashMap::new(),
            enabled: true,
        }
    }

    /// A store that never touches the filesystem.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            write_through: BTreeSet::new(),
            flushed: HashMap::new(),
            enabled: false,
        }
    }

    /// Mark a table for immediate flush-on-growth.
    pub fn register(&mut self, table: impl Into<String>) {
        self.write_through.insert(table.into());
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for table in tables {
            self.register(table);
        }
        self
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", table.to_ascii_lowercase()))
    }

    /// Load every registered table from disk, preserving index order.
    /// Missing files are fine: the table simply starts empty.
    pub fn load(&mut self, registry: &mut LookupRegistry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        for table in self.write_through.clone() {
            let path = self.table_path(&table);
            if !path.exists() {
                continue;
            }
            let count = load_table(&path, &table, registry)?;
            self.flushed.insert(table.clone(), count);
            tracing::debug!(table = %table, values = count, "loaded lookup table");
        }
        Ok(())
    }

    /// Append every not-yet-persisted value of the registered tables.
    /// Returns the number of values written. Cheap when nothing grew.
    pub fn flush(&mut self, registry: &LookupRegistry) -> Result<usize> {
        let mut written = 0;
        for table in &self.write_through {
            let Some(lookup) = registry.table(table) else {
                continue;
            };
            let cursor = self.flushed.get(table).copied().unwrap_or(0);
            if lookup.len() <= cursor {
                continue;
            }
            if self.enabled {
                append_values(&self.table_path(table), &lookup.values()[cursor..])?;
            }
            written += lookup.len() - cursor;
            self.flushed.insert(table.clone(), lookup.len());
        }
        Ok(written)
    }
}

fn load_table(path: &Path, table: &str, registry: &mut LookupRegistry) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open lookup file: {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        let value =
            line.with_context(|| format!("Failed to read lookup file: {}", path.display()))?;
        registry.intern(table, &value);
        count += 1;
    }
    Ok(count)
}

fn append_values(path: &Path, values: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create lookup dir: {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open lookup file: {}", path.display()))?;
    for value in values {
        writeln!(file, "{value}")
            .with_context(|| format!("Failed to append to lookup file: {}", path.display()))?;
    }
    Ok(())
}
