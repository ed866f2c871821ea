use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};

/// Streams the rows of a CSV file as owned string fields.
///
/// The reader owns the file handle; it is closed when the reader is dropped,
/// whether the rows were exhausted or not.
pub struct CsvRecordReader {
    path: PathBuf,
    inner: csv::Reader<File>,
    record: StringRecord,
    rows_read: usize,
}

impl CsvRecordReader {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open csv data: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            record: StringRecord::new(),
            rows_read: 0,
        })
    }

    /// One-based number of the last row handed out.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Reads the next row, failing with `what` in the message if the file ends.
    pub fn expect_row(&mut self, what: &str) -> Result<Vec<String>> {
        match self.next() {
            Some(row) => row,
            None => bail!(
                "{} ended before the {what} row (read {} rows)",
                self.path.display(),
                self.rows_read
            ),
        }
    }
}

impl Iterator for CsvRecordReader {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.read_record(&mut self.record) {
            Ok(true) => {
                self.rows_read += 1;
                Some(Ok(self.record.iter().map(ToOwned::to_owned).collect()))
            }
            Ok(false) => None,
            Err(err) => Some(Err::<Vec<String>, _>(err).with_context(|| {
                format!(
                    "failed to read row {} of {}",
                    self.rows_read + 1,
                    self.path.display()
                )
            })),
        }
    }
}
