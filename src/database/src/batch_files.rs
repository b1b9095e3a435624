//! Batch file naming and discovery
//!
//! Generated rows are handed from the generator to the loader through files
//! named `tsv-<service>-<execution order>-<table>[__<batch index>].tsv`.
//! The execution order is unique across a whole run, the batch index is only
//! present when a table was split into several files.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{DatabaseError, Result, Service};

pub const FILE_PREFIX: &str = "tsv";
pub const FILE_EXTENSION: &str = "tsv";
pub const BATCH_SEPARATOR: &str = "__";

/// Literal written in place of SQL NULL
pub const NULL_SENTINEL: &str = "NULL";

/// Field delimiter of batch files
pub const DELIMITER: u8 = b'\t';

/// Structured form of a batch file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchFileName {
    pub service: Service,
    pub execution_order: u64,
    pub table: String,
    pub batch_index: Option<u32>,
}

impl BatchFileName {
    pub fn new(
        service: Service,
        execution_order: u64,
        table: impl Into<String>,
        batch_index: Option<u32>,
    ) -> Self {
        Self {
            service,
            execution_order,
            table: table.into(),
            batch_index,
        }
    }

    pub fn file_name(&self) -> String {
        match self.batch_index {
            Some(index) => format!(
                "{FILE_PREFIX}-{}-{}-{}{BATCH_SEPARATOR}{}.{FILE_EXTENSION}",
                self.service, self.execution_order, self.table, index
            ),
            None => format!(
                "{FILE_PREFIX}-{}-{}-{}.{FILE_EXTENSION}",
                self.service, self.execution_order, self.table
            ),
        }
    }

    /// Returns `Ok(None)` for names that are not batch files at all and an
    /// error for names that look like batch files but do not parse.
    pub fn parse(file_name: &str) -> Result<Option<Self>> {
        let Some(stem) = file_name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(FILE_EXTENSION))
            .and_then(|rest| rest.strip_suffix('.'))
        else {
            return Ok(None);
        };

        let malformed = || DatabaseError::BatchFileName(file_name.to_string());

        let mut parts = stem.splitn(3, '-');
        let service = parts.next().ok_or_else(malformed)?;
        let order = parts.next().ok_or_else(malformed)?;
        let rest = parts.next().ok_or_else(malformed)?;

        let service = service.parse::<Service>().map_err(|_| malformed())?;
        let execution_order = order.parse::<u64>().map_err(|_| malformed())?;

        let (table, batch_index) = match rest.split_once(BATCH_SEPARATOR) {
            Some((table, index)) => (table, Some(index.parse::<u32>().map_err(|_| malformed())?)),
            None => (rest, None),
        };
        if table.is_empty() {
            return Err(malformed());
        }

        Ok(Some(Self::new(service, execution_order, table, batch_index)))
    }
}

impl fmt::Display for BatchFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// A batch file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub name: BatchFileName,
    pub path: PathBuf,
}

/// Index of the batch files present in one output directory
#[derive(Debug, Clone, Default)]
pub struct BatchDirectory {
    root: PathBuf,
    files: Vec<BatchFile>,
}

impl BatchDirectory {
    /// Read the directory once and index every batch file in it
    pub async fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut entries = tokio::fs::read_dir(&root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = BatchFileName::parse(file_name)? {
                files.push(BatchFile {
                    name,
                    path: entry.path(),
                });
            }
        }

        files.sort_by_key(|file| file.name.execution_order);
        debug!("Found {} batch files in {}", files.len(), root.display());

        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[BatchFile] {
        &self.files
    }

    /// Files of one table, ordered by batch index
    pub fn files_for(&self, service: Service, table: &str) -> Vec<&BatchFile> {
        let mut files: Vec<&BatchFile> = self
            .files
            .iter()
            .filter(|file| file.name.service == service && file.name.table == table)
            .collect();
        files.sort_by_key(|file| (file.name.batch_index, file.name.execution_order));
        files
    }

    /// Services that have at least one batch file
    pub fn services(&self) -> BTreeSet<Service> {
        self.files.iter().map(|file| file.name.service).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_name_without_batch_index() {
        let name = BatchFileName::new(Service::Carina, 4, "reward", None);
        assert_eq!(name.file_name(), "tsv-carina-4-reward.tsv");
    }

    #[test]
    fn test_file_name_with_batch_index() {
        let name = BatchFileName::new(Service::Polaris, 17, "account_holder", Some(2));
        assert_eq!(name.file_name(), "tsv-polaris-17-account_holder__2.tsv");
    }

    #[test]
    fn test_parse_inverts_file_name() {
        for name in [
            BatchFileName::new(Service::Vela, 1, "retailer_rewards", None),
            BatchFileName::new(Service::Polaris, 230, "task_type_key_value", Some(12)),
        ] {
            assert_eq!(BatchFileName::parse(&name.file_name()).unwrap(), Some(name));
        }
    }

    #[test]
    fn test_parse_ignores_foreign_files() {
        assert_eq!(BatchFileName::parse("README.md").unwrap(), None);
        assert_eq!(BatchFileName::parse("tsv-carina-4-reward.csv").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(BatchFileName::parse("tsv-cosmos-4-reward.tsv").is_err());
        assert!(BatchFileName::parse("tsv-carina-x-reward.tsv").is_err());
        assert!(BatchFileName::parse("tsv-carina-4-reward__b.tsv").is_err());
        assert!(BatchFileName::parse("tsv-carina-4.tsv").is_err());
    }

    #[tokio::test]
    async fn test_scan_orders_files_by_batch_index() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "tsv-carina-9-reward__2.tsv",
            "tsv-carina-7-reward__0.tsv",
            "tsv-carina-8-reward__1.tsv",
            "tsv-carina-3-retailer.tsv",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let batches = BatchDirectory::scan(dir.path()).await.unwrap();
        assert_eq!(batches.len(), 4);

        let orders: Vec<u64> = batches
            .files_for(Service::Carina, "reward")
            .iter()
            .map(|file| file.name.execution_order)
            .collect();
        assert_eq!(orders, vec![7, 8, 9]);
        assert!(batches.files_for(Service::Vela, "reward").is_empty());
        assert_eq!(batches.services().into_iter().collect::<Vec<_>>(), vec![Service::Carina]);
    }
}
