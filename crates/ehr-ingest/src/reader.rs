//! Line-oriented reading of delimited extracts.
//!
//! The validator's contract is per-line: it must see empty lines, short
//! lines, and over-long lines exactly as they appear in the file, so this
//! reader splits on the configured delimiter without any quoting or
//! row-shape recovery. Files of arbitrary size stream through a fixed
//! buffer; nothing is held beyond the current line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// One raw line of an extract.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 1-based physical line number (the header is line 1).
    pub number: u64,
    /// The line as read, without the trailing newline.
    pub raw: String,
    /// Cells split on the delimiter, trimmed.
    pub columns: Vec<String>,
}

impl RawLine {
    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Streaming reader over a delimited text file.
pub struct DelimitedReader<R> {
    inner: R,
    delimiter: char,
    line_number: u64,
}

impl DelimitedReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, delimiter: char) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), delimiter))
    }
}

impl<R: BufRead> DelimitedReader<R> {
    pub fn new(inner: R, delimiter: char) -> Self {
        Self {
            inner,
            delimiter,
            line_number: 0,
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Read the next line, or `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<RawLine>> {
        let mut buffer = String::new();
        let read = self
            .inner
            .read_line(&mut buffer)
            .with_context(|| format!("Failed to read line {}", self.line_number + 1))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        while buffer.ends_with('\n') || buffer.ends_with('\r') {
            buffer.pop();
        }
        if self.line_number == 1 {
            buffer = buffer.trim_start_matches('\u{feff}').to_string();
        }
        let columns = split_columns(&buffer, self.delimiter);
        Ok(Some(RawLine {
            number: self.line_number,
            raw: buffer,
            columns,
        }))
    }
}

/// Split a line into trimmed cells. An empty line yields one empty cell,
/// matching the delimiter-count arithmetic the validator expects.
pub fn split_columns(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|cell| cell.trim().to_string())
        .collect()
}
