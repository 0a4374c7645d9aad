//! CSV Checked-Set Store
//!
//! Implements CheckedSetStore with one CSV file per namespace, one
//! identifier per row. Commits re-read the file, merge by union, and
//! replace it atomically (temp file in the same directory + rename).

use crate::config::Config;
use crate::domain::entities::{CheckedSet, CommitSummary};
use crate::domain::errors::StoreError;
use crate::domain::ports::CheckedSetStore;
use crate::domain::value_objects::Namespace;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Header row written at the top of every checked-set file.
const HEADER: &str = "identifier";

struct CheckedFile {
    path: PathBuf,
    /// Serializes read-merge-replace cycles for this namespace.
    commit_lock: Mutex<()>,
}

/// File-backed checked-set store.
///
/// Commits are serialized per namespace within the process. Readers never
/// observe a half-written file because the replacement is a rename.
pub struct CsvCheckedSetStore {
    files: HashMap<Namespace, Arc<CheckedFile>>,
}

impl CsvCheckedSetStore {
    /// Create a store with no namespaces configured.
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    /// Configure the file for one namespace.
    pub fn with_path(mut self, namespace: Namespace, path: impl Into<PathBuf>) -> Self {
        self.files.insert(
            namespace,
            Arc::new(CheckedFile {
                path: path.into(),
                commit_lock: Mutex::new(()),
            }),
        );
        self
    }

    /// Create a store using the configured IP and MAC paths.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_path(Namespace::Ip, &config.checked_ips_path)
            .with_path(Namespace::Mac, &config.checked_macs_path)
    }

    pub fn path(&self, namespace: Namespace) -> Option<&Path> {
        self.files.get(&namespace).map(|f| f.path.as_path())
    }

    /// Read the canonical keys of a file in file order, deduplicated.
    ///
    /// A missing file is empty. Rows that do not decode or do not hold an
    /// identifier are skipped with a warning; any I/O failure is an error.
    fn read_keys(path: &Path, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
        {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(read_error(path, e)),
        };

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut skipped = 0usize;

        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(read_error(path, e)),
                Err(e) => {
                    tracing::warn!("checked set {} row {}: {}", path.display(), line + 1, e);
                    skipped += 1;
                    continue;
                }
            };
            let Some(value) = row.get(0).map(str::trim) else {
                continue;
            };
            if value.is_empty() || value.eq_ignore_ascii_case(HEADER) {
                continue;
            }
            match namespace.canonicalize(value) {
                Ok(key) => {
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
                Err(e) => {
                    tracing::warn!("checked set {} row {}: {}", path.display(), line + 1, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "checked set {} loaded with {} unreadable rows skipped",
                path.display(),
                skipped
            );
        }
        Ok(keys)
    }

    /// Merge keys into the file. Caller holds the namespace commit lock.
    fn merge_into_file(
        path: &Path,
        namespace: Namespace,
        keys: &HashSet<String>,
    ) -> Result<CommitSummary, StoreError> {
        // A file that exists but cannot be read must not be replaced.
        let mut merged = Self::read_keys(path, namespace)?;
        let existing: HashSet<&str> = merged.iter().map(String::as_str).collect();

        let mut additions: Vec<String> = keys
            .iter()
            .filter(|k| !existing.contains(k.as_str()))
            .cloned()
            .collect();
        drop(existing);

        if additions.is_empty() {
            return Ok(CommitSummary {
                added: 0,
                total: merged.len(),
            });
        }

        additions.sort();
        let added = additions.len();
        merged.extend(additions);

        Self::replace_file(path, &merged)?;

        Ok(CommitSummary {
            added,
            total: merged.len(),
        })
    }

    fn replace_file(path: &Path, keys: &[String]) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let csv_err = |source: csv::Error| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            writer.write_record([HEADER]).map_err(csv_err)?;
            for key in keys {
                writer.write_record([key]).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file_mut().flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl Default for CsvCheckedSetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_not_found(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(e) if e.kind() == io::ErrorKind::NotFound)
}

fn read_error(path: &Path, err: csv::Error) -> StoreError {
    let source = match err.into_kind() {
        csv::ErrorKind::Io(source) => source,
        other => io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", other)),
    };
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl CheckedSetStore for CsvCheckedSetStore {
    async fn load(&self, namespace: Namespace) -> CheckedSet {
        let Some(file) = self.files.get(&namespace).cloned() else {
            tracing::warn!("no checked-set file configured for {}", namespace);
            return CheckedSet::new(namespace);
        };

        match tokio::task::spawn_blocking(move || Self::read_keys(&file.path, namespace)).await {
            Ok(Ok(keys)) => {
                tracing::debug!("loaded {} checked {} identifiers", keys.len(), namespace);
                CheckedSet::with_members(namespace, keys)
            }
            Ok(Err(e)) => {
                tracing::warn!("{}, treating as empty", e);
                CheckedSet::new(namespace)
            }
            Err(e) => {
                tracing::warn!("checked-set load task failed for {}: {:?}", namespace, e);
                CheckedSet::new(namespace)
            }
        }
    }

    async fn commit(
        &self,
        namespace: Namespace,
        keys: &HashSet<String>,
    ) -> Result<CommitSummary, StoreError> {
        let file = self
            .files
            .get(&namespace)
            .cloned()
            .ok_or(StoreError::Unconfigured(namespace))?;
        let keys = keys.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = file.commit_lock.lock();
            Self::merge_into_file(&file.path, namespace, &keys)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
