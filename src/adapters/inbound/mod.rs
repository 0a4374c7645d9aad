mod api_server;
mod batch_runner;

pub use api_server::{router, ApiServer, ApiState};
pub use batch_runner::{BatchRunner, RunSummary};

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use api_server::{BatchRequest, BatchResponse, EntryResponse, HealthResponse};
#[allow(unused_imports)]
pub use batch_runner::{read_identifiers, write_records, InputFile};
