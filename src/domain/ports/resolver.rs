//! Resolver Port
//!
//! Defines the interface for turning one identifier into a lookup result.

use crate::domain::entities::LookupResult;
use crate::domain::value_objects::{Identifier, Namespace};
use async_trait::async_trait;

/// Resolver for one identifier namespace.
///
/// This is an outbound port. Implementations may call a remote provider or
/// scan a local table. They never raise past this boundary: every error path
/// becomes `LookupResult::Failure`. Resolvers do not touch the checked-set;
/// only the batch engine commits.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// The namespace this resolver answers for.
    fn namespace(&self) -> Namespace;

    /// Resolve a single identifier.
    async fn resolve(&self, identifier: &Identifier) -> LookupResult;
}
