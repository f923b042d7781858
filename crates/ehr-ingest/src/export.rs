//! Analysis-ready CSV export.
//!
//! Rows come out uncompressed, in the canonical data-definition column
//! order, with dates as 8-digit calendar strings. This is the surface the
//! statistics modules consume; the encoded store stays the internal
//! format.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

use ehr_model::{Episode, InputDescriptor, LookupRegistry, Patient, RecordKind};

/// Header row for an export of the given shape.
pub fn export_headers(descriptor: &InputDescriptor) -> Vec<String> {
    let mut headers: Vec<String> = descriptor
        .kind
        .mandatory_columns()
        .iter()
        .map(|c| (*c).to_string())
        .collect();
    for column in &descriptor.extended {
        headers.push(column.name.clone());
    }
    headers.push("SubsetID".to_string());
    headers
}

pub struct ExportWriter {
    inner: csv::Writer<File>,
    kind: RecordKind,
}

impl ExportWriter {
    pub fn create(path: impl AsRef<Path>, descriptor: &InputDescriptor) -> Result<Self> {
        let path = path.as_ref();
        let mut inner = csv::WriterBuilder::new()
            .from_path(path)
            .with_context(|| format!("Failed to create export file: {}", path.display()))?;
        inner
            .write_record(export_headers(descriptor))
            .context("Failed to write export header")?;
        Ok(Self {
            inner,
            kind: descriptor.kind,
        })
    }

    pub fn write_episode(
        &mut self,
        episode: &Episode,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> Result<()> {
        debug_assert_eq!(episode.kind(), self.kind);
        self.inner
            .write_record(episode.to_export(registry, descriptor))
            .context("Failed to write export row")
    }

    pub fn write_patient(
        &mut self,
        patient: &Patient,
        registry: &LookupRegistry,
        descriptor: &InputDescriptor,
    ) -> Result<()> {
        debug_assert_eq!(self.kind, RecordKind::Patient);
        self.inner
            .write_record(patient.to_export(registry, descriptor))
            .context("Failed to write export row")
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner.flush().context("Failed to flush export file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_model::DateFormat;

    #[test]
    fn export_carries_resolved_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let descriptor =
            InputDescriptor::new(RecordKind::Event).with_date_format(DateFormat::YearMonthDay);

        let mut registry = LookupRegistry::new();
        let columns: Vec<String> = ["p1", "2008-01-05", "stroke"]
            .iter()
            .map(|v| (*v).to_string())
            .collect();
        let episode = Episode::from_input(&columns, &descriptor, &mut registry).unwrap();

        let mut writer = ExportWriter::create(&path, &descriptor).unwrap();
        writer.write_episode(&episode, &registry, &descriptor).unwrap();
        writer.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("PatientID,Date,EventType,SubsetID"));
        assert_eq!(lines.next(), Some("p1,20080105,STROKE,0"));
    }
}
