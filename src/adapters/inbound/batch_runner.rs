//! Folder Batch Runner
//!
//! CLI adapter: every `*.csv` in an input folder becomes one engine batch,
//! and freshly resolved identifiers are written to a timestamped CSV in the
//! output folder.

use crate::application::BatchLookupEngine;
use crate::domain::entities::{BatchEntry, BatchReport};
use crate::domain::ports::Resolver;
use crate::domain::services::ResultFormatter;
use crate::domain::value_objects::{Identifier, Namespace};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Aggregate result of one folder run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub outputs: Vec<PathBuf>,
    pub report: BatchReport,
    pub cancelled: bool,
}

/// Identifiers read from one input file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InputFile {
    pub identifiers: Vec<String>,
    pub unreadable_rows: usize,
}

pub struct BatchRunner {
    engine: Arc<BatchLookupEngine>,
    resolver: Arc<dyn Resolver>,
}

impl BatchRunner {
    pub fn new(engine: Arc<BatchLookupEngine>, resolver: Arc<dyn Resolver>) -> Self {
        Self { engine, resolver }
    }

    pub fn namespace(&self) -> Namespace {
        self.resolver.namespace()
    }

    /// Process every CSV file of `input_dir` in name order.
    pub async fn run_folder(&self, input_dir: &Path, output_dir: &Path) -> anyhow::Result<RunSummary> {
        let inputs = list_csv_files(input_dir)?;
        if inputs.is_empty() {
            tracing::warn!("no CSV files found in {}", input_dir.display());
        }
        fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create output folder {}", output_dir.display()))?;

        let mut summary = RunSummary::default();
        for path in inputs {
            if self.engine.shutdown_controller().is_shutdown() {
                summary.cancelled = true;
                break;
            }

            let input = read_identifiers(&path, self.namespace())?;
            tracing::info!(
                "processing {} ({} identifiers)",
                path.display(),
                input.identifiers.len()
            );

            let outcome = self
                .engine
                .run_batch(&input.identifiers, self.namespace(), self.resolver.as_ref())
                .await?;

            let mut report = outcome.report.clone();
            report.malformed += input.unreadable_rows;
            summary.report.absorb(&report);
            summary.files_processed += 1;
            summary.cancelled |= outcome.cancelled;

            let output = output_path(&path, output_dir);
            if write_records(&output, outcome.namespace, &outcome.entries)? {
                tracing::info!("wrote {}", output.display());
                summary.outputs.push(output);
            } else {
                tracing::info!("no new identifiers in {}", path.display());
            }

            if outcome.cancelled {
                break;
            }
        }

        let r = &summary.report;
        tracing::info!(
            "batch run complete: files={} new={} ok={} failed={} cached={} duplicates={} malformed={} not_attempted={}",
            summary.files_processed,
            r.newly_checked,
            r.resolved_success,
            r.resolved_failure,
            r.skipped_cached,
            r.duplicates,
            r.malformed,
            r.not_attempted
        );
        Ok(summary)
    }
}

fn list_csv_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read input folder {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read the first column of an input file.
///
/// The first row is dropped when it does not parse as an identifier of the
/// namespace (a header). Blank rows are ignored. Malformed identifiers are
/// kept so the engine reports them.
pub fn read_identifiers(path: &Path, namespace: Namespace) -> anyhow::Result<InputFile> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut input = InputFile::default();
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
            Err(e) => {
                tracing::warn!("{} row {}: {}", path.display(), line + 1, e);
                input.unreadable_rows += 1;
                continue;
            }
        };

        let value = row.get(0).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        if line == 0 && Identifier::parse(namespace, value).is_err() {
            continue;
        }
        input.identifiers.push(value.to_string());
    }
    Ok(input)
}

fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("batch");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    output_dir.join(format!("{}_{}.csv", stem, timestamp))
}

/// Write the fresh entries of a batch. Returns false when there was nothing
/// to write and no file was created.
pub fn write_records(path: &Path, namespace: Namespace, entries: &[BatchEntry]) -> anyhow::Result<bool> {
    let fresh: Vec<(&BatchEntry, _)> = entries
        .iter()
        .filter(|e| e.status.is_fresh())
        .filter_map(|e| e.status.lookup().map(|lookup| (e, lookup)))
        .collect();
    if fresh.is_empty() {
        return Ok(false);
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for (entry, lookup) in fresh {
        match namespace {
            Namespace::Ip => writer.serialize(ResultFormatter::ip_record(&entry.identifier, lookup))?,
            Namespace::Mac => writer.serialize(ResultFormatter::mac_record(&entry.identifier, lookup))?,
        }
    }
    writer.flush()?;
    Ok(true)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::{EntryStatus, LookupData, LookupResult, VendorMatch};

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    // ===== Input Reading =====

    #[test]
    fn test_read_identifiers_skips_header_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "in.csv", "IP\n8.8.8.8\n\n1.1.1.1,extra\n");

        let input = read_identifiers(&path, Namespace::Ip).unwrap();
        assert_eq!(input.identifiers, vec!["8.8.8.8", "1.1.1.1"]);
        assert_eq!(input.unreadable_rows, 0);
    }

    #[test]
    fn test_read_identifiers_without_header_keeps_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "in.csv", "aa:bb:cc:00:00:01\nnot-a-mac\n");

        let input = read_identifiers(&path, Namespace::Mac).unwrap();
        // Malformed rows after the first are passed through for reporting.
        assert_eq!(input.identifiers, vec!["aa:bb:cc:00:00:01", "not-a-mac"]);
    }

    #[test]
    fn test_list_csv_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.csv", "");
        write_file(dir.path(), "a.CSV", "");
        write_file(dir.path(), "notes.txt", "");

        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    // ===== Output =====

    #[test]
    fn test_output_path_format() {
        let path = output_path(Path::new("/in/devices.csv"), Path::new("/out"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("devices_"));
        assert!(name.ends_with(".csv"));
        // devices_YYYYmmdd_HHMMSS.csv
        assert_eq!(name.len(), "devices_".len() + 15 + ".csv".len());
    }

    #[test]
    fn test_write_records_only_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let found = LookupResult::success(LookupData::Mac(VendorMatch::Found("Acme Corp".into())));
        let entries = vec![
            BatchEntry {
                identifier: "aa:bb:cc:00:00:01".into(),
                status: EntryStatus::Resolved { lookup: found.clone() },
            },
            BatchEntry {
                identifier: "AA-BB-CC-00-00-01".into(),
                status: EntryStatus::BatchCached { lookup: found },
            },
            BatchEntry {
                identifier: "11:22:33:44:55:66".into(),
                status: EntryStatus::AlreadyChecked,
            },
        ];

        assert!(write_records(&path, Namespace::Mac, &entries).unwrap());
        let body = fs::read_to_string(&path).unwrap();
        assert_eq!(body, "MAC,Manufacturer\naa:bb:cc:00:00:01,Acme Corp\n");
    }

    #[test]
    fn test_write_records_nothing_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let entries = vec![BatchEntry {
            identifier: "8.8.8.8".into(),
            status: EntryStatus::AlreadyChecked,
        }];

        assert!(!write_records(&path, Namespace::Ip, &entries).unwrap());
        assert!(!path.exists());
    }
}
