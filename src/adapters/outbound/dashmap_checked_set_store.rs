//! DashMap Checked-Set Store
//!
//! Implements CheckedSetStore in memory. Used by ephemeral servers and tests;
//! nothing survives the process.

use crate::domain::entities::{CheckedSet, CommitSummary};
use crate::domain::errors::StoreError;
use crate::domain::ports::CheckedSetStore;
use crate::domain::value_objects::Namespace;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// DashMap-backed checked-set store.
///
/// Each namespace's set lives under one map entry, so a commit holds that
/// entry's shard lock for the duration of the union.
pub struct DashMapCheckedSetStore {
    sets: Arc<DashMap<Namespace, HashSet<String>>>,
}

impl DashMapCheckedSetStore {
    pub fn new() -> Self {
        Self {
            sets: Arc::new(DashMap::new()),
        }
    }

    /// Current size of a namespace.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.sets.get(&namespace).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for DashMapCheckedSetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckedSetStore for DashMapCheckedSetStore {
    async fn load(&self, namespace: Namespace) -> CheckedSet {
        match self.sets.get(&namespace) {
            Some(set) => CheckedSet::with_members(namespace, set.iter().cloned()),
            None => CheckedSet::new(namespace),
        }
    }

    async fn commit(
        &self,
        namespace: Namespace,
        keys: &HashSet<String>,
    ) -> Result<CommitSummary, StoreError> {
        let mut set = self.sets.entry(namespace).or_default();
        let before = set.len();
        set.extend(keys.iter().cloned());
        Ok(CommitSummary {
            added: set.len() - before,
            total: set.len(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_load() {
        let store = DashMapCheckedSetStore::new();
        assert!(store.load(Namespace::Ip).await.is_empty());
        assert_eq!(store.len(Namespace::Ip), 0);
    }

    #[tokio::test]
    async fn test_commit_monotonic() {
        let store = DashMapCheckedSetStore::new();

        let first = store.commit(Namespace::Ip, &keys(&["1.1.1.1"])).await.unwrap();
        assert_eq!(first, CommitSummary { added: 1, total: 1 });

        let again = store.commit(Namespace::Ip, &keys(&["1.1.1.1"])).await.unwrap();
        assert_eq!(again, CommitSummary { added: 0, total: 1 });

        let more = store
            .commit(Namespace::Ip, &keys(&["1.1.1.1", "8.8.8.8"]))
            .await
            .unwrap();
        assert_eq!(more, CommitSummary { added: 1, total: 2 });
        assert!(store.load(Namespace::Ip).await.contains("8.8.8.8"));
    }

    #[tokio::test]
    async fn test_namespaces_independent() {
        let store = DashMapCheckedSetStore::new();
        store.commit(Namespace::Mac, &keys(&["AABBCC"])).await.unwrap();

        assert_eq!(store.len(Namespace::Mac), 1);
        assert_eq!(store.len(Namespace::Ip), 0);
    }

    #[tokio::test]
    async fn test_concurrent_commits() {
        let store = Arc::new(DashMapCheckedSetStore::new());
        let mut handles = Vec::new();

        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let ip = format!("192.0.2.{}", i);
                store.commit(Namespace::Ip, &keys(&[ip.as_str()])).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.len(Namespace::Ip), 50);
    }
}
