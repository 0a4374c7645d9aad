//! Result Formatter Service
//!
//! Pure domain logic that flattens a lookup result into a fixed-field
//! record for tabular or JSON output.

use crate::domain::entities::{IpDetails, LookupData, LookupResult, VendorMatch};
use crate::domain::value_objects::Namespace;
use serde::{Deserialize, Serialize};

/// Placeholder for any field the provider did not return.
pub const NOT_AVAILABLE: &str = "N/A";

/// Manufacturer value when no vendor prefix matched.
pub const VENDOR_NOT_FOUND: &str = "not found";

/// Flat geolocation record. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRecord {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Org")]
    pub org: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
}

/// Flat vendor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacRecord {
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
}

/// Either record shape, for callers that handle both namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlatRecord {
    Ip(IpRecord),
    Mac(MacRecord),
}

/// Flattens lookup results.
///
/// A `Failure` (or a payload of the wrong kind) formats to a record whose
/// every data field is "N/A".
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(namespace: Namespace, identifier: &str, result: &LookupResult) -> FlatRecord {
        match namespace {
            Namespace::Ip => FlatRecord::Ip(Self::ip_record(identifier, result)),
            Namespace::Mac => FlatRecord::Mac(Self::mac_record(identifier, result)),
        }
    }

    pub fn ip_record(ip: &str, result: &LookupResult) -> IpRecord {
        let empty = IpDetails::default();
        let details = match result {
            LookupResult::Success {
                data: LookupData::Ip(details),
            } => details,
            _ => &empty,
        };

        let (latitude, longitude) = split_loc(details.loc.as_deref());

        IpRecord {
            ip: ip.to_string(),
            hostname: or_na(&details.hostname),
            city: or_na(&details.city),
            region: or_na(&details.region),
            country: or_na(&details.country),
            org: or_na(&details.org),
            latitude,
            longitude,
        }
    }

    pub fn mac_record(mac: &str, result: &LookupResult) -> MacRecord {
        let manufacturer = match result {
            LookupResult::Success {
                data: LookupData::Mac(VendorMatch::Found(name)),
            } => name.clone(),
            LookupResult::Success {
                data: LookupData::Mac(VendorMatch::NotFound),
            } => VENDOR_NOT_FOUND.to_string(),
            _ => NOT_AVAILABLE.to_string(),
        };

        MacRecord {
            mac: mac.to_string(),
            manufacturer,
        }
    }
}

fn or_na(field: &Option<String>) -> String {
    match field.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Split "lat,long". Anything with fewer than two parts maps both to "N/A".
fn split_loc(loc: Option<&str>) -> (String, String) {
    let parts: Vec<&str> = match loc {
        Some(loc) => loc.split(',').map(str::trim).collect(),
        None => Vec::new(),
    };

    match parts.as_slice() {
        [lat, long, ..] if !lat.is_empty() && !long.is_empty() => {
            (lat.to_string(), long.to_string())
        }
        _ => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    }
}
