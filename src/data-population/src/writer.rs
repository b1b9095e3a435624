//! Batch file writer
//!
//! Rows are written tab-delimited and unquoted, in the text format
//! PostgreSQL's `COPY` reads. Nothing is escaped: a value that would need
//! escaping is a generation bug and fails the write.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use pyxis_database::batch_files::{FILE_EXTENSION, FILE_PREFIX};
use pyxis_database::{BatchFileName, Service, TableSpec, DELIMITER};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::WriteError;
use crate::rows::Row;

const UNENCODABLE: [char; 4] = ['\t', '\n', '\r', '\\'];

/// Run-wide counter handing out batch file execution orders
#[derive(Debug)]
pub struct ExecutionOrder {
    next: AtomicU64,
}

impl ExecutionOrder {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ExecutionOrder {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// A batch file that has been written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBatch {
    pub name: BatchFileName,
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes batch files into one output directory
#[derive(Debug, Clone)]
pub struct BatchWriter {
    output_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `rows` of `table` to a new batch file numbered from `order`
    pub fn write(
        &self,
        service: Service,
        table: &TableSpec,
        batch_index: Option<u32>,
        order: &ExecutionOrder,
        rows: &[Row],
    ) -> Result<WrittenBatch, WriteError> {
        validate_rows(table, rows)?;

        let name = BatchFileName::new(service, order.next(), table.name, batch_index);
        let path = self.output_dir.join(name.file_name());
        let csv_error = |source| WriteError::Csv {
            path: path.clone(),
            source,
        };

        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_error)?;

        for row in rows {
            writer
                .write_record(row.iter().map(|value| value.encode().into_owned()))
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {} rows to {}", rows.len(), path.display());

        Ok(WrittenBatch {
            name,
            path,
            rows: rows.len(),
        })
    }
}

fn validate_rows(table: &TableSpec, rows: &[Row]) -> Result<(), WriteError> {
    for (index, row) in rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            return Err(WriteError::ColumnMismatch {
                table: table.name.to_string(),
                row: index,
                expected: table.columns.len(),
                actual: row.len(),
            });
        }
        for (value, column) in row.iter().zip(table.columns) {
            if value.encode().contains(UNENCODABLE) {
                return Err(WriteError::UnencodableField {
                    table: table.name.to_string(),
                    row: index,
                    column,
                });
            }
        }
    }
    Ok(())
}

/// Create `dir` if needed and remove batch files left by an earlier run.
/// Returns the number of files removed.
pub async fn clear_output_dir(dir: &Path) -> Result<usize, WriteError> {
    let io_error = |source| WriteError::Io {
        path: dir.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(io_error)?;

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let is_batch_file = file_name.starts_with(&format!("{FILE_PREFIX}-"))
            && file_name.ends_with(&format!(".{FILE_EXTENSION}"));
        if !is_batch_file {
            continue;
        }

        let path = entry.path();
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| WriteError::Io { path, source })?;
        removed += 1;
    }

    if removed > 0 {
        debug!("Removed {} stale batch files from {}", removed, dir.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::rows::Value;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use pyxis_database::services::{REWARD_UPDATE, RETAILER_REWARDS};
    use tempfile::TempDir;

    #[test]
    fn test_execution_order_is_monotonic() {
        let order = ExecutionOrder::default();
        assert_eq!(order.next(), 1);
        assert_eq!(order.next(), 2);
        assert_eq!(ExecutionOrder::starting_at(40).next(), 40);
    }

    #[test]
    fn test_writes_tab_delimited_rows() {
        let dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(dir.path());
        let order = ExecutionOrder::starting_at(7);
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        let rows = vec![
            row![1u64, now, now, "2d0c9ea4-3f34-4b2f-a7fb-6a0b6a64a4f1", now.date_naive(), "ISSUED"],
            row![2u64, now, now, "0c1a3a8e-8d2f-4c22-b1c4-3f2f8c9e2c10", Value::Null, "REDEEMED"],
        ];
        let written = writer
            .write(Service::Carina, &REWARD_UPDATE, Some(3), &order, &rows)
            .unwrap();

        assert_eq!(
            written.path.file_name().unwrap().to_str(),
            Some("tsv-carina-7-reward_update__3.tsv")
        );
        assert_eq!(written.rows, 2);

        let contents = std::fs::read_to_string(&written.path).unwrap();
        assert_eq!(
            contents,
            "1\t2024-01-15T09:00:00.000000Z\t2024-01-15T09:00:00.000000Z\t2d0c9ea4-3f34-4b2f-a7fb-6a0b6a64a4f1\t2024-01-15\tISSUED\n\
             2\t2024-01-15T09:00:00.000000Z\t2024-01-15T09:00:00.000000Z\t0c1a3a8e-8d2f-4c22-b1c4-3f2f8c9e2c10\tNULL\tREDEEMED\n"
        );
    }

    #[test]
    fn test_rejects_values_needing_escapes() {
        let dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(dir.path());
        let order = ExecutionOrder::default();

        for bad in ["tab\there", "line\nbreak", "carriage\rreturn", "back\\slash"] {
            let error = writer
                .write(Service::Vela, &RETAILER_REWARDS, None, &order, &[row![1u64, bad]])
                .unwrap_err();
            assert!(matches!(
                error,
                WriteError::UnencodableField { column: "slug", row: 0, .. }
            ));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_rows_of_the_wrong_width() {
        let dir = TempDir::new().unwrap();
        let writer = BatchWriter::new(dir.path());
        let error = writer
            .write(Service::Vela, &RETAILER_REWARDS, None, &ExecutionOrder::default(), &[row![1u64]])
            .unwrap_err();
        assert!(matches!(
            error,
            WriteError::ColumnMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_output_dir_only_removes_batch_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tsv-vela-1-campaign.tsv"), "").unwrap();
        std::fs::write(dir.path().join("tsv-polaris-2-account_holder__1.tsv"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(clear_output_dir(dir.path()).await.unwrap(), 2);
        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("notes.txt")]);

        let fresh = dir.path().join("fresh");
        assert_eq!(clear_output_dir(&fresh).await.unwrap(), 0);
        assert!(fresh.is_dir());
    }
}
