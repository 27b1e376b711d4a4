//! CSV price file.
//!
//! Layout is one header row followed by `symbol,date,price,currency`
//! records, ready for GnuCash's price import.

use super::SinkError;
use crate::domain::PriceRow;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Append-only CSV writer for one run.
///
/// The file is checked for conflicts when the sink is opened but only
/// created (or truncated) on the first write, so a run without prices
/// leaves the file system untouched.
pub struct CsvSink {
    path: PathBuf,
    overwrite: bool,
    writer: Option<::csv::Writer<File>>,
    rows_written: usize,
}

impl CsvSink {
    /// Fails with [`SinkError::FileConflict`] if `path` exists and
    /// `overwrite` is false. The existing file is not touched.
    pub fn open(path: impl Into<PathBuf>, overwrite: bool) -> Result<Self, SinkError> {
        let path = path.into();
        if path.exists() && !overwrite {
            return Err(SinkError::FileConflict { path });
        }
        Ok(Self {
            path,
            overwrite,
            writer: None,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append `rows` and flush. Returns the number of rows written.
    pub fn write(&mut self, rows: &[PriceRow]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let file = self.create_file()?;
                tracing::debug!(path = %self.path.display(), overwrite = self.overwrite, "created csv file");
                self.writer.insert(::csv::Writer::from_writer(file))
            }
        };

        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.rows_written += rows.len();
        Ok(rows.len())
    }

    fn create_file(&self) -> Result<File, SinkError> {
        let mut options = OpenOptions::new();
        options.write(true);
        if self.overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        options.open(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::AlreadyExists {
                SinkError::FileConflict {
                    path: self.path.clone(),
                }
            } else {
                SinkError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rows() -> Vec<PriceRow> {
        vec![
            PriceRow {
                symbol: "VWRL.AS".into(),
                commodity_guid: "vwrl".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                price: 105.12,
                currency: "EUR".into(),
            },
            PriceRow {
                symbol: "VWRL.AS".into(),
                commodity_guid: "vwrl".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                price: 106.5,
                currency: "EUR".into(),
            },
        ]
    }

    #[test]
    fn writes_header_and_rows_in_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut sink = CsvSink::open(&path, false).unwrap();
        assert_eq!(sink.write(&rows()).unwrap(), 2);
        assert_eq!(sink.write(&rows()[..1]).unwrap(), 1);
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "symbol,date,price,currency\n\
             VWRL.AS,2024-01-02,105.12,EUR\n\
             VWRL.AS,2024-01-03,106.5,EUR\n\
             VWRL.AS,2024-01-02,105.12,EUR\n"
        );
    }

    #[test]
    fn existing_file_without_overwrite_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "keep me\n").unwrap();

        let err = CsvSink::open(&path, false).err().unwrap();
        assert!(matches!(err, SinkError::FileConflict { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me\n");
    }

    #[test]
    fn overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "a much longer previous content\n".repeat(20)).unwrap();

        let mut sink = CsvSink::open(&path, true).unwrap();
        sink.write(&rows()[..1]).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "symbol,date,price,currency\nVWRL.AS,2024-01-02,105.12,EUR\n"
        );
    }

    #[test]
    fn no_rows_means_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut sink = CsvSink::open(&path, false).unwrap();
        assert_eq!(sink.write(&[]).unwrap(), 0);
        drop(sink);
        assert!(!path.exists());
    }

    #[test]
    fn file_created_after_open_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut sink = CsvSink::open(&path, false).unwrap();
        std::fs::write(&path, "raced\n").unwrap();

        let err = sink.write(&rows()).unwrap_err();
        assert!(matches!(err, SinkError::FileConflict { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "raced\n");
    }
}
