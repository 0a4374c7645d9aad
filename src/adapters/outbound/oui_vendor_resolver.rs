//! OUI Vendor Resolver
//!
//! Implements Resolver for MAC addresses using a vendor-prefix table
//! loaded once into memory.

use crate::domain::entities::{LookupData, LookupResult, VendorMatch};
use crate::domain::ports::Resolver;
use crate::domain::value_objects::{normalize_mac, Identifier, Namespace, OUI_HEX_LEN};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PREFIX_COLUMNS: &[&str] = &["assignment", "oui", "prefix", "mac prefix", "mac"];
const VENDOR_COLUMNS: &[&str] = &[
    "organization name",
    "manufacturer",
    "vendor",
    "vendor name",
    "company",
];

/// Failure to load a vendor table.
#[derive(Debug, thiserror::Error)]
pub enum VendorTableError {
    #[error("failed to open vendor table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read vendor table: {0}")]
    Read(#[from] csv::Error),
}

/// Vendor-prefix table keyed by normalized 6-hex-digit prefix.
///
/// Accepts the IEEE `oui.csv` layout (`Assignment`, `Organization Name`
/// columns) or any CSV whose first two columns are prefix and vendor, with
/// or without a header row. When a prefix appears more than once, the row
/// earliest in the file wins.
#[derive(Debug, Default)]
pub struct VendorTable {
    vendors: HashMap<String, String>,
    skipped_rows: usize,
}

impl VendorTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VendorTableError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|source| VendorTableError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_csv(reader)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, VendorTableError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, VendorTableError> {
        let mut table = Self::default();
        let mut columns = (0usize, 1usize);
        let mut duplicates = 0usize;

        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("vendor table row {}: {}", line + 1, e);
                    table.skipped_rows += 1;
                    continue;
                }
            };

            if line == 0 {
                if let Some(header_columns) = detect_header(&row) {
                    columns = header_columns;
                    continue;
                }
            }

            let prefix = row.get(columns.0).map(str::trim).unwrap_or_default();
            let vendor = row.get(columns.1).map(str::trim).unwrap_or_default();

            let prefix = match normalize_mac(prefix) {
                Ok(p) if p.len() == OUI_HEX_LEN && !vendor.is_empty() => p,
                _ => {
                    // An unrecognized first row is an unknown header, not bad data.
                    if line > 0 {
                        table.skipped_rows += 1;
                    }
                    continue;
                }
            };

            if table.vendors.contains_key(&prefix) {
                duplicates += 1;
                continue;
            }
            table.vendors.insert(prefix, vendor.to_string());
        }

        if table.skipped_rows > 0 {
            tracing::warn!(
                "vendor table: skipped {} malformed rows",
                table.skipped_rows
            );
        }
        tracing::debug!(
            "vendor table: {} prefixes loaded, {} duplicate prefixes ignored",
            table.vendors.len(),
            duplicates
        );
        Ok(table)
    }

    /// Vendor for a normalized 6-hex-digit prefix.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.vendors.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    /// Rows skipped as malformed while loading.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

fn detect_header(row: &csv::StringRecord) -> Option<(usize, usize)> {
    let position = |names: &[&str]| {
        row.iter()
            .position(|cell| names.contains(&cell.trim().to_lowercase().as_str()))
    };
    Some((position(PREFIX_COLUMNS)?, position(VENDOR_COLUMNS)?))
}

/// MAC vendor resolver.
///
/// A prefix that matches no row is a successful lookup answering
/// `VendorMatch::NotFound`, not a failure.
#[derive(Clone)]
pub struct OuiVendorResolver {
    table: Arc<VendorTable>,
}

impl OuiVendorResolver {
    pub fn new(table: VendorTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Load the vendor table from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VendorTableError> {
        Ok(Self::new(VendorTable::from_path(path)?))
    }

    pub fn table(&self) -> &VendorTable {
        &self.table
    }

    /// Synchronous lookup, shared by the async trait impl.
    pub fn lookup(&self, identifier: &Identifier) -> LookupResult {
        let Some(prefix) = identifier.oui_prefix() else {
            return LookupResult::failure(format!("{} is not a MAC identifier", identifier));
        };

        let found = match self.table.lookup(prefix) {
            Some(vendor) => VendorMatch::Found(vendor.to_string()),
            None => VendorMatch::NotFound,
        };
        LookupResult::success(LookupData::Mac(found))
    }
}

#[async_trait]
impl Resolver for OuiVendorResolver {
    fn namespace(&self) -> Namespace {
        Namespace::Mac
    }

    async fn resolve(&self, identifier: &Identifier) -> LookupResult {
        self.lookup(identifier)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn mac(raw: &str) -> Identifier {
        Identifier::parse(Namespace::Mac, raw).unwrap()
    }

    fn resolver(csv: &str) -> OuiVendorResolver {
        OuiVendorResolver::new(VendorTable::from_reader(csv.as_bytes()).unwrap())
    }

    #[test]
    fn test_match_and_not_found() {
        let r = resolver("AA-BB-CC,Acme Corp\n");

        assert_eq!(
            r.lookup(&mac("aa:bb:cc:11:22:33")),
            LookupResult::success(LookupData::Mac(VendorMatch::Found("Acme Corp".into())))
        );
        assert_eq!(
            r.lookup(&mac("11:22:33:44:55:66")),
            LookupResult::success(LookupData::Mac(VendorMatch::NotFound))
        );
    }

    #[test]
    fn test_ieee_layout_with_header() {
        let csv = "Registry,Assignment,Organization Name,Organization Address\n\
                   MA-L,00000C,\"Cisco Systems, Inc\",170 West Tasman Dr\n\
                   MA-L,AABBCC,Acme Corp,Somewhere\n";
        let r = resolver(csv);

        assert_eq!(r.table().len(), 2);
        assert_eq!(r.table().lookup("00000C"), Some("Cisco Systems, Inc"));
        assert_eq!(r.table().lookup("AABBCC"), Some("Acme Corp"));
        assert_eq!(r.table().skipped_rows(), 0);
    }

    #[test]
    fn test_first_row_wins_on_duplicate_prefix() {
        let r = resolver("prefix,vendor\naa:bb:cc,First Inc\nAABBCC,Second Inc\n");
        assert_eq!(r.table().lookup("AABBCC"), Some("First Inc"));
        assert_eq!(r.table().len(), 1);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let r = resolver("AA-BB-CC,Acme Corp\nnot-a-prefix,Nobody\nDD-EE-FF,\nAABBCCDD,Too Long\n");
        assert_eq!(r.table().len(), 1);
        assert_eq!(r.table().skipped_rows(), 3);
    }

    #[test]
    fn test_ip_identifier_is_failure() {
        let r = resolver("AA-BB-CC,Acme Corp\n");
        let ip = Identifier::parse(Namespace::Ip, "1.1.1.1").unwrap();
        assert!(!r.lookup(&ip).is_success());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Assignment,Organization Name").unwrap();
        writeln!(file, "AABBCC,Acme Corp").unwrap();

        let r = OuiVendorResolver::from_file(file.path()).unwrap();
        assert_eq!(r.table().lookup("AABBCC"), Some("Acme Corp"));
    }

    #[test]
    fn test_from_file_nonexistent() {
        let result = OuiVendorResolver::from_file("/nonexistent/path/oui.csv");
        assert!(matches!(result, Err(VendorTableError::Open { .. })));
    }

    #[tokio::test]
    async fn test_resolve_via_trait() {
        let r = resolver("AA-BB-CC,Acme Corp\n");
        assert_eq!(r.namespace(), Namespace::Mac);
        let result = r.resolve(&mac("AA:BB:CC:00:00:01")).await;
        assert!(result.is_success());
        assert!(!result.is_vendor_not_found());
    }
}
