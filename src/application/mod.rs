mod lookup_engine;

pub use lookup_engine::BatchLookupEngine;
