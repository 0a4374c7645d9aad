//! netlookup Library
//!
//! This module exposes the netlookup components for use in integration tests
//! and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::BatchLookupEngine;
pub use config::{load_config, Config};
pub use domain::entities::{BatchEntry, BatchOutcome, BatchReport, EntryStatus, LookupResult};
pub use domain::ports::{CheckedSetStore, Resolver};
pub use domain::services::ResultFormatter;
pub use domain::value_objects::{Identifier, Namespace};
pub use infrastructure::ShutdownController;
