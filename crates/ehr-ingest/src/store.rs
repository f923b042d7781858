//! The encoded patient-object store.
//!
//! One file per record kind, one compact comma-separated row per record:
//! `subset,patientId,type,date[,value|duration]{,extAttr}*[,flag]`.
//! Column order and the trailing prescription flag are contract. The
//! external merge step concatenates and sorts these files per patient;
//! this module only reads and writes them.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use ehr_model::{Episode, Patient, RecordKind};

pub struct EncodedWriter {
    inner: BufWriter<File>,
    kind: RecordKind,
    rows: u64,
}

impl EncodedWriter {
    pub fn create(path: impl AsRef<Path>, kind: RecordKind) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create encoded store: {}", path.display()))?;
        Ok(Self {
            inner: BufWriter::new(file),
            kind,
            rows: 0,
        })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn write_episode(&mut self, episode: &Episode) -> Result<()> {
        debug_assert_eq!(episode.kind(), self.kind);
        writeln!(self.inner, "{}", episode.to_encoded()).context("Failed to write encoded row")?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_patient(&mut self, patient: &Patient) -> Result<()> {
        debug_assert_eq!(self.kind, RecordKind::Patient);
        writeln!(self.inner, "{}", patient.to_encoded()).context("Failed to write encoded row")?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner.flush().context("Failed to flush encoded store")
    }
}

/// Streaming reader over an encoded episode file.
pub struct EncodedReader {
    inner: BufReader<File>,
    kind: RecordKind,
    line: u64,
}

impl EncodedReader {
    pub fn open(path: impl AsRef<Path>, kind: RecordKind) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open encoded store: {}", path.display()))?;
        Ok(Self {
            inner: BufReader::new(file),
            kind,
            line: 0,
        })
    }

    fn next_row(&mut self) -> Result<Option<String>> {
        let mut buffer = String::new();
        let read = self.inner.read_line(&mut buffer)?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;
        while buffer.ends_with('\n') || buffer.ends_with('\r') {
            buffer.pop();
        }
        Ok(Some(buffer))
    }
}

impl Iterator for EncodedReader {
    type Item = Result<Episode>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Err(error) => Some(Err(error)),
            Ok(None) => None,
            Ok(Some(row)) => {
                let fields: Vec<&str> = row.split(',').collect();
                Some(
                    Episode::from_encoded(self.kind, &fields)
                        .with_context(|| format!("Bad encoded row at line {}", self.line)),
                )
            }
        }
    }
}

/// Decode every patient row of an encoded patients file.
pub fn read_patients(path: impl AsRef<Path>) -> Result<Vec<Patient>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open encoded store: {}", path.display()))?;
    let mut patients = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        patients.push(
            Patient::from_encoded(&fields)
                .with_context(|| format!("Bad encoded row at line {}", index + 1))?,
        );
    }
    Ok(patients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prescriptions.enc");

        let rows = [
            "0,p1,0,733042,30,0",
            "0,p2,1,733050,-1,1",
            "S2,p3,0,733060,7,0",
        ];
        let mut writer = EncodedWriter::create(&path, RecordKind::Prescription).unwrap();
        for row in rows {
            let fields: Vec<&str> = row.split(',').collect();
            let episode = Episode::from_encoded(RecordKind::Prescription, &fields).unwrap();
            writer.write_episode(&episode).unwrap();
        }
        assert_eq!(writer.rows_written(), 3);
        writer.finish().unwrap();

        let decoded: Vec<Episode> = EncodedReader::open(&path, RecordKind::Prescription)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        for (episode, row) in decoded.iter().zip(rows) {
            assert_eq!(episode.to_encoded(), row);
        }
    }

    #[test]
    fn reader_surfaces_bad_rows_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.enc");
        std::fs::write(&path, "0,p1,0,733042\n0,p2,not-a-number,733050\n").unwrap();

        let results: Vec<_> = EncodedReader::open(&path, RecordKind::Event).unwrap().collect();
        assert!(results[0].is_ok());
        let error = results[1].as_ref().unwrap_err();
        assert!(format!("{error:#}").contains("line 2"));
    }

    #[test]
    fn patients_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.enc");
        std::fs::write(&path, "0,p1,710347,1,730120,735964\n").unwrap();
        let patients = read_patients(&path).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].to_encoded(), "0,p1,710347,1,730120,735964");
    }
}
