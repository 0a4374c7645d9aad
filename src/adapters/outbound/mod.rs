mod csv_checked_set_store;
mod dashmap_checked_set_store;
mod ipinfo_resolver;
mod oui_vendor_resolver;

pub use csv_checked_set_store::CsvCheckedSetStore;
pub use dashmap_checked_set_store::DashMapCheckedSetStore;
pub use ipinfo_resolver::IpinfoResolver;
pub use oui_vendor_resolver::{OuiVendorResolver, VendorTable, VendorTableError};
