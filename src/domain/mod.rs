//! Domain Layer
//!
//! Lookup entities, identifier value objects, ports and pure services.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;
