//! Value Objects - Immutable domain primitives
//!
//! Identifiers are compared by their canonical key, which depends on the
//! namespace they belong to.

use crate::domain::errors::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Number of hex digits in an OUI (vendor) prefix.
pub const OUI_HEX_LEN: usize = 6;

/// Identifier kind. IP and MAC checked-sets are independent namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Ip,
    Mac,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Mac => "mac",
        }
    }

    /// Compute the canonical key used for dedup and checked-set membership.
    ///
    /// IP addresses are kept verbatim (trimmed) once they parse. MAC
    /// addresses are upper-cased and stripped of `:`, `-` and `.` separators.
    pub fn canonicalize(&self, raw: &str) -> Result<String, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        match self {
            Self::Ip => trimmed
                .parse::<IpAddr>()
                .map(|_| trimmed.to_string())
                .map_err(|_| IdentifierError::InvalidIp(trimmed.to_string())),
            Self::Mac => normalize_mac(trimmed),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ip" => Ok(Self::Ip),
            "mac" | "oui" => Ok(Self::Mac),
            other => Err(IdentifierError::UnknownNamespace(other.to_string())),
        }
    }
}

/// Case-fold a MAC address (or bare OUI prefix) and strip its separators.
///
/// Accepts between 6 (prefix only) and 16 (EUI-64) hex digits.
pub fn normalize_mac(raw: &str) -> Result<String, IdentifierError> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if digits.len() < OUI_HEX_LEN
        || digits.len() > 16
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(IdentifierError::InvalidMac(raw.trim().to_string()));
    }
    Ok(digits)
}

/// A validated identifier.
///
/// Keeps the string as the caller gave it (for output) alongside the
/// canonical key (for comparisons).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    namespace: Namespace,
    raw: String,
    key: String,
}

impl Identifier {
    pub fn parse(namespace: Namespace, raw: &str) -> Result<Self, IdentifierError> {
        let key = namespace.canonicalize(raw)?;
        Ok(Self {
            namespace,
            raw: raw.trim().to_string(),
            key,
        })
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The identifier as given (whitespace trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The canonical form used for dedup and checked-set membership.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The 6-hex-digit vendor prefix. `None` for IP identifiers.
    pub fn oui_prefix(&self) -> Option<&str> {
        match self.namespace {
            Namespace::Mac => Some(&self.key[..OUI_HEX_LEN]),
            Namespace::Ip => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_from_str() {
        assert_eq!("ip".parse::<Namespace>().unwrap(), Namespace::Ip);
        assert_eq!("MAC".parse::<Namespace>().unwrap(), Namespace::Mac);
        assert_eq!("oui".parse::<Namespace>().unwrap(), Namespace::Mac);
        assert!(matches!(
            "dns".parse::<Namespace>(),
            Err(IdentifierError::UnknownNamespace(_))
        ));
    }

    #[test]
    fn test_namespace_serde_lowercase() {
        let json = serde_json::to_string(&Namespace::Mac).unwrap();
        assert_eq!(json, "\"mac\"");
        let ns: Namespace = serde_json::from_str("\"ip\"").unwrap();
        assert_eq!(ns, Namespace::Ip);
    }

    #[test]
    fn test_ip_kept_verbatim() {
        let id = Identifier::parse(Namespace::Ip, " 8.8.8.8 ").unwrap();
        assert_eq!(id.as_str(), "8.8.8.8");
        assert_eq!(id.key(), "8.8.8.8");
        assert!(id.oui_prefix().is_none());
    }

    #[test]
    fn test_ipv6_accepted() {
        let id = Identifier::parse(Namespace::Ip, "2001:4860:4860::8888").unwrap();
        assert_eq!(id.key(), "2001:4860:4860::8888");
    }

    #[test]
    fn test_invalid_ip_rejected() {
        assert_eq!(
            Identifier::parse(Namespace::Ip, "not-an-ip"),
            Err(IdentifierError::InvalidIp("not-an-ip".to_string()))
        );
        assert_eq!(
            Identifier::parse(Namespace::Ip, "   "),
            Err(IdentifierError::Empty)
        );
    }

    #[test]
    fn test_mac_separators_and_case_folded() {
        let a = Identifier::parse(Namespace::Mac, "aa:bb:cc:11:22:33").unwrap();
        let b = Identifier::parse(Namespace::Mac, "AA-BB-CC-11-22-33").unwrap();
        let c = Identifier::parse(Namespace::Mac, "aabb.cc11.2233").unwrap();
        assert_eq!(a.key(), "AABBCC112233");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), c.key());
        assert_eq!(a.as_str(), "aa:bb:cc:11:22:33");
        assert_eq!(a.oui_prefix(), Some("AABBCC"));
    }

    #[test]
    fn test_bare_oui_prefix_accepted() {
        let id = Identifier::parse(Namespace::Mac, "AA-BB-CC").unwrap();
        assert_eq!(id.oui_prefix(), Some("AABBCC"));
    }

    #[test]
    fn test_invalid_mac_rejected() {
        assert!(normalize_mac("AA:BB").is_err());
        assert!(normalize_mac("ZZ:BB:CC:11:22:33").is_err());
        assert!(normalize_mac("AA:BB:CC:11:22:33:44:55:66").is_err());
    }
}
