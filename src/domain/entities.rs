//! Domain Entities - Core lookup objects
//!
//! These entities describe lookup results, the checked-set and the outcome
//! of a batch. They have no I/O dependencies.

use crate::domain::value_objects::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Geolocation fields returned by the IP provider.
///
/// Every field is optional upstream; the formatter substitutes "N/A".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpDetails {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    /// Compound "latitude,longitude".
    #[serde(default)]
    pub loc: Option<String>,
}

/// Answer of a vendor-prefix lookup.
///
/// A missing prefix is a successful lookup with an empty answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorMatch {
    Found(String),
    NotFound,
}

/// Successful lookup payload, one fixed shape per namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupData {
    Ip(IpDetails),
    Mac(VendorMatch),
}

/// Result of resolving one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupResult {
    Success { data: LookupData },
    Failure { reason: String },
}

impl LookupResult {
    pub fn success(data: LookupData) -> Self {
        Self::Success { data }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// True for a MAC lookup whose prefix matched no vendor.
    pub fn is_vendor_not_found(&self) -> bool {
        matches!(
            self,
            Self::Success {
                data: LookupData::Mac(VendorMatch::NotFound)
            }
        )
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failure { reason } => Some(reason),
            Self::Success { .. } => None,
        }
    }
}

/// Identifiers already resolved, for one namespace.
///
/// Members are canonical keys (see `Namespace::canonicalize`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedSet {
    namespace: Namespace,
    members: HashSet<String>,
}

impl CheckedSet {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            members: HashSet::new(),
        }
    }

    pub fn with_members<I, S>(namespace: Namespace, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace,
            members: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Membership test for a raw identifier, after normalization.
    ///
    /// Identifiers that fail to normalize are never members.
    pub fn contains(&self, raw: &str) -> bool {
        self.namespace
            .canonicalize(raw)
            .map(|key| self.members.contains(&key))
            .unwrap_or(false)
    }

    /// Membership test for an already canonical key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    /// Returns true when the key was not present before.
    pub fn insert(&mut self, key: String) -> bool {
        self.members.insert(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }
}

/// Effect of one commit on the durable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Identifiers that were not present before this commit.
    pub added: usize,
    /// Size of the checked-set after the commit.
    pub total: usize,
}

/// How one input position of a batch was served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    /// Present in the checked-set at batch start; no new data.
    AlreadyChecked,
    /// Resolved by this batch.
    Resolved { lookup: LookupResult },
    /// Repeat of an identifier earlier in the same batch.
    BatchCached { lookup: LookupResult },
    /// Resolved by a concurrent batch that was already looking it up.
    Shared { lookup: LookupResult },
    /// Batch was cancelled before this identifier was dispatched.
    NotAttempted,
}

impl EntryStatus {
    pub fn lookup(&self) -> Option<&LookupResult> {
        match self {
            Self::Resolved { lookup } | Self::BatchCached { lookup } | Self::Shared { lookup } => {
                Some(lookup)
            }
            Self::AlreadyChecked | Self::NotAttempted => None,
        }
    }

    /// True only for the first occurrence that carries fresh data.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Resolved { .. } | Self::Shared { .. })
    }
}

/// One input position of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub identifier: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Completion counts of a batch.
///
/// Resolution counts are per distinct identifier; `malformed` and
/// `duplicates` are per input item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub skipped_cached: usize,
    pub resolved_success: usize,
    pub resolved_failure: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub not_attempted: usize,
    pub newly_checked: usize,
}

impl BatchReport {
    /// Merge the counts of another batch into this one.
    pub fn absorb(&mut self, other: &BatchReport) {
        self.skipped_cached += other.skipped_cached;
        self.resolved_success += other.resolved_success;
        self.resolved_failure += other.resolved_failure;
        self.malformed += other.malformed;
        self.duplicates += other.duplicates;
        self.not_attempted += other.not_attempted;
        self.newly_checked += other.newly_checked;
    }

    pub fn has_new(&self) -> bool {
        self.newly_checked > 0
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub namespace: Namespace,
    pub entries: Vec<BatchEntry>,
    /// Canonical keys committed by this batch.
    pub newly_checked: HashSet<String>,
    /// Raw input items skipped as malformed.
    pub malformed: Vec<String>,
    pub report: BatchReport,
    pub cancelled: bool,
}
