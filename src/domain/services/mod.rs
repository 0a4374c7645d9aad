mod result_formatter;

pub use result_formatter::{FlatRecord, IpRecord, MacRecord, ResultFormatter, NOT_AVAILABLE, VENDOR_NOT_FOUND};
