//! Loading labeled text samples from CSV.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, SieveError};

/// Name of the column holding the sample text.
pub const TEXT_COLUMN: &str = "text";

/// Name of the column holding the categorical label.
pub const LABEL_COLUMN: &str = "label";

/// A single labeled training sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub text: String,
    pub label: String,
}

impl Sample {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Ordered table of `(text, label)` records.
///
/// Text and label columns are stored side by side and always have the same
/// number of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTable {
    texts: Vec<String>,
    labels: Vec<String>,
}

impl SampleTable {
    /// Load a table from a CSV file with `text` and `label` columns.
    ///
    /// # Errors
    /// Returns `SieveError::Io` if the file cannot be read and
    /// `SieveError::DataFormat` if a required column is missing or a record
    /// is malformed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading sample table");
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a table from any CSV source. Extra columns are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let text_idx = column_index(&headers, TEXT_COLUMN)?;
        let label_idx = column_index(&headers, LABEL_COLUMN)?;

        let mut table = Self::default();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            // Both indices are in range: the reader rejects records whose
            // length differs from the header.
            let text = record.get(text_idx).ok_or_else(|| {
                SieveError::DataFormat(format!("row {}: missing `{TEXT_COLUMN}` field", row + 1))
            })?;
            let label = record.get(label_idx).ok_or_else(|| {
                SieveError::DataFormat(format!("row {}: missing `{LABEL_COLUMN}` field", row + 1))
            })?;
            table.push(Sample::new(text, label));
        }

        debug!(rows = table.len(), "Sample table loaded");
        Ok(table)
    }

    /// Build a table from in-memory `(text, label)` pairs.
    pub fn from_pairs<I, T, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, L)>,
        T: Into<String>,
        L: Into<String>,
    {
        let mut table = Self::default();
        for (text, label) in pairs {
            table.push(Sample::new(text, label));
        }
        table
    }

    pub fn push(&mut self, sample: Sample) {
        self.texts.push(sample.text);
        self.labels.push(sample.label);
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Iterate over `(text, label)` rows in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.texts
            .iter()
            .zip(&self.labels)
            .map(|(t, l)| (t.as_str(), l.as_str()))
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| SieveError::DataFormat(format!("missing required column `{name}`")))
}
