//! Recipient identifiers accepted by directories.

use std::str::FromStr;

use alloy::primitives::{Address, B256};

use super::{LookupOptions, PublicKeyBytes};
use crate::error::{Result, ShadeError};

/// What a recipient identifier refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientId {
    /// An account address
    Address(Address),
    /// A raw uncompressed public key used as both spending and viewing key
    PublicKey(PublicKeyBytes),
    /// A transaction whose sender is the recipient
    TxHash(B256),
    /// A human-readable name
    Name(String),
}

impl RecipientId {
    /// Classifies an identifier, honouring the lookup options.
    ///
    /// # Errors
    /// `InputValidation` for an empty identifier, or a public key / transaction
    /// hash when the corresponding option is off.
    pub fn classify(id: &str, options: LookupOptions) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ShadeError::InputValidation("recipient identifier is empty".into()));
        }

        let is_hex = id.starts_with("0x") && id[2..].bytes().all(|b| b.is_ascii_hexdigit());
        if !is_hex {
            return Ok(RecipientId::Name(id.to_string()));
        }

        match id.len() {
            42 => Address::from_str(id)
                .map(RecipientId::Address)
                .map_err(|e| ShadeError::InputValidation(format!("recipient address '{id}': {e}"))),
            66 if options.support_tx_hash => B256::from_str(id)
                .map(RecipientId::TxHash)
                .map_err(|e| ShadeError::InputValidation(format!("recipient tx hash '{id}': {e}"))),
            66 => Err(ShadeError::InputValidation(
                "transaction hash identifiers require support_tx_hash".into(),
            )),
            132 if options.support_pub_key => {
                PublicKeyBytes::from_hex(id).map(RecipientId::PublicKey)
            }
            132 => Err(ShadeError::InputValidation(
                "public key identifiers require support_pub_key".into(),
            )),
            len => Err(ShadeError::InputValidation(format!(
                "recipient identifier '{id}' has unsupported length {len}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> LookupOptions {
        LookupOptions {
            advanced: false,
            support_pub_key: true,
            support_tx_hash: true,
        }
    }

    #[test]
    fn test_address() {
        let id = format!("0x{}", "ab".repeat(20));
        assert!(matches!(
            RecipientId::classify(&id, LookupOptions::default()).unwrap(),
            RecipientId::Address(_)
        ));
    }

    #[test]
    fn test_name() {
        assert_eq!(
            RecipientId::classify("alice.eth", LookupOptions::default()).unwrap(),
            RecipientId::Name("alice.eth".into())
        );
    }

    #[test]
    fn test_tx_hash_requires_option() {
        let id = format!("0x{}", "12".repeat(32));
        assert!(RecipientId::classify(&id, LookupOptions::default()).is_err());
        assert!(matches!(
            RecipientId::classify(&id, all()).unwrap(),
            RecipientId::TxHash(_)
        ));
    }

    #[test]
    fn test_public_key_requires_option() {
        let id = format!("0x04{}", "11".repeat(64));
        assert!(RecipientId::classify(&id, LookupOptions::default()).is_err());
        assert!(matches!(
            RecipientId::classify(&id, all()).unwrap(),
            RecipientId::PublicKey(_)
        ));
    }

    #[test]
    fn test_empty_and_odd_lengths() {
        assert!(RecipientId::classify("  ", all()).is_err());
        assert!(RecipientId::classify("0x1234", all()).is_err());
    }
}
