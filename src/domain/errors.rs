//! Domain Errors
//!
//! Typed failures for input parsing, checked-set persistence and batches.
//! Per-identifier resolution failures are not errors: they travel inside
//! `LookupResult::Failure`.

use crate::domain::value_objects::Namespace;
use std::path::PathBuf;

/// A raw identifier that cannot be used as input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("empty identifier")]
    Empty,
    #[error("invalid IP address: {0}")]
    InvalidIp(String),
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
}

/// Durable read or write failure of the checked-set store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no checked-set location configured for namespace {0}")]
    Unconfigured(Namespace),
    #[error("checked set {path} I/O failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode checked set {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("checked-set writer task failed: {0}")]
    Task(String),
}

/// Failure that aborts a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("resolver serves namespace {actual}, batch requested {expected}")]
    NamespaceMismatch {
        expected: Namespace,
        actual: Namespace,
    },
    #[error("commit of {pending} identifiers to the {namespace} checked set failed: {source}")]
    Commit {
        namespace: Namespace,
        pending: usize,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_error_display() {
        let err = IdentifierError::InvalidIp("300.1.1.1".to_string());
        assert_eq!(err.to_string(), "invalid IP address: 300.1.1.1");
    }

    #[test]
    fn test_commit_error_keeps_source() {
        let err = BatchError::Commit {
            namespace: Namespace::Ip,
            pending: 3,
            source: StoreError::Unconfigured(Namespace::Ip),
        };
        assert!(err.to_string().contains("3 identifiers"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
