//! Checked-Set Store Port
//!
//! Defines the interface for the durable record of identifiers that were
//! already resolved.

use crate::domain::entities::{CheckedSet, CommitSummary};
use crate::domain::errors::StoreError;
use crate::domain::value_objects::Namespace;
use async_trait::async_trait;
use std::collections::HashSet;

/// Persisted set of already-resolved identifiers, per namespace.
///
/// Membership is monotonic: commits merge by union and nothing is ever
/// removed.
#[async_trait]
pub trait CheckedSetStore: Send + Sync {
    /// Read the record for a namespace.
    ///
    /// Never fails: a missing or corrupt record yields an empty (or partial)
    /// set and a logged warning.
    async fn load(&self, namespace: Namespace) -> CheckedSet;

    /// Merge canonical keys into the durable record.
    ///
    /// Idempotent. Commits to the same namespace are serialized, and a
    /// failed write leaves the previous record intact.
    async fn commit(
        &self,
        namespace: Namespace,
        keys: &HashSet<String>,
    ) -> Result<CommitSummary, StoreError>;
}
