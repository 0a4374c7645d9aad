//! Adapters Layer
//!
//! Inbound adapters drive the engine (CLI folder runner, REST API);
//! outbound adapters implement the domain ports.

pub mod inbound;
pub mod outbound;
