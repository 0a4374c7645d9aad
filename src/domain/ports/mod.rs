mod checked_set_store;
mod resolver;

pub use checked_set_store::CheckedSetStore;
pub use resolver::Resolver;
