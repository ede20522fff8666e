//! Addresses that must never receive a stealth payment.
//!
//! The list is external data (sanctions lists and the like) supplied by the
//! caller. It is loaded from a JSON array of address strings:
//!
//! ```json
//! ["0x8589427373D6D84E98730D7795D8f6f8731FDA16", "0x..."]
//! ```

use std::collections::HashSet;
use std::path::Path;

use alloy::primitives::Address;

use shade_core::error::{Result, ShadeError};
use shade_core::types::parse_address;

/// A set of forbidden stealth addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Denylist {
    addresses: HashSet<Address>,
}

impl Denylist {
    /// Builds a denylist from addresses.
    pub fn from_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Parses a JSON array of address strings. Letter case is ignored.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<String> = serde_json::from_str(json)
            .map_err(|e| ShadeError::Config(format!("denylist must be a JSON array of addresses: {e}")))?;
        let addresses = entries
            .iter()
            .map(|entry| {
                parse_address(entry).map_err(|e| ShadeError::Config(format!("denylist entry: {e}")))
            })
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { addresses })
    }

    /// Loads a JSON denylist file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Returns true if the address is forbidden.
    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Fails with `UnsafeAddress` if the address is forbidden.
    pub fn check(&self, address: &Address) -> Result<()> {
        if self.contains(address) {
            return Err(ShadeError::UnsafeAddress(address.to_checksum(None)));
        }
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns true if nothing is forbidden.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LISTED: &str = "0x8589427373D6D84E98730D7795D8f6f8731FDA16";

    #[test]
    fn test_from_json_ignores_case() {
        let json = format!(r#"["{}"]"#, LISTED.to_lowercase());
        let denylist = Denylist::from_json_str(&json).unwrap();
        let address = parse_address(LISTED).unwrap();

        assert_eq!(denylist.len(), 1);
        assert!(denylist.contains(&address));
        assert!(matches!(denylist.check(&address), Err(ShadeError::UnsafeAddress(_))));
        assert!(denylist.check(&Address::ZERO).is_ok());
    }

    #[test]
    fn test_bad_entries_rejected() {
        assert!(Denylist::from_json_str(r#"["0x1234"]"#).is_err());
        assert!(Denylist::from_json_str(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["{LISTED}"]"#).unwrap();
        let denylist = Denylist::from_file(file.path()).unwrap();
        assert!(!denylist.is_empty());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Denylist::default().is_empty());
    }
}
