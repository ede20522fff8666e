//! Protocol constants for SHADE.
//!
//! Curve sizes are those of secp256k1 SEC1 encodings. Message strings are
//! part of the protocol: changing them changes every derived key.

use alloy::primitives::{address, Address};

// ═══════════════════════════════════════════════════════════════════════════════
// SECP256K1 SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a private scalar in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of an uncompressed SEC1 public key (tag byte + x + y).
pub const UNCOMPRESSED_PUBLIC_KEY_SIZE: usize = 65;

/// Size of a compressed SEC1 public key (prefix byte + x).
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;

/// Leading tag byte of an uncompressed SEC1 point.
pub const UNCOMPRESSED_TAG: u8 = 0x04;

/// Compression prefix for a point with even y.
pub const PREFIX_EVEN: u8 = 0x02;

/// Compression prefix for a point with odd y.
pub const PREFIX_ODD: u8 = 0x03;

/// Prefix used to rebuild ephemeral keys from an announcement's `pkx`.
///
/// Decryption only uses the x-coordinate of the ECDH point, which is the same
/// for both parities, so a fixed prefix always recovers the shared secret.
pub const ANNOUNCEMENT_PKX_PREFIX: u8 = PREFIX_EVEN;

/// Size of the encrypted random number carried by an announcement.
pub const CIPHERTEXT_SIZE: usize = 32;

/// Size of a recoverable ECDSA signature (r || s || v).
pub const SIGNATURE_SIZE: usize = 65;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of Ethereum address in bytes (20 bytes = 160 bits).
pub const ETH_ADDRESS_SIZE: usize = 20;

/// Size of keccak256 hash output.
pub const KECCAK256_SIZE: usize = 32;

/// Placeholder token address used for native-asset payments.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Chain ID of the primary network (no suffix on the key derivation message).
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Gas limit of a plain value transfer.
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Message signed to derive spending and viewing keys.
pub const KEY_DERIVATION_MESSAGE: &str =
    "Sign this message to access your Umbra account.\n\nOnly sign this message for a trusted client!";

/// Builds the key derivation message for a chain.
///
/// Non-primary networks append the chain ID so a signature collected on one
/// chain cannot be replayed to derive keys for another.
pub fn key_derivation_message(chain_id: u64) -> String {
    if chain_id == MAINNET_CHAIN_ID {
        KEY_DERIVATION_MESSAGE.to_string()
    } else {
        format!("{KEY_DERIVATION_MESSAGE}\n\nChain ID: {chain_id}")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RETRIEVAL & SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Page size for indexed announcement queries.
pub const INDEXER_PAGE_SIZE: usize = 1000;

/// Name of the row collection returned by the indexer.
pub const INDEXER_ENTITY_KEY: &str = "announcementEntities";

/// Default number of announcements matched concurrently.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 16;

/// Attempts at generating a random number before giving up on denylist hits.
pub const MAX_STEALTH_ATTEMPTS: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_sizes() {
        assert_eq!(UNCOMPRESSED_PUBLIC_KEY_SIZE, 1 + 2 * PRIVATE_KEY_SIZE);
        assert_eq!(COMPRESSED_PUBLIC_KEY_SIZE, 1 + PRIVATE_KEY_SIZE);
        assert_eq!(SIGNATURE_SIZE, 2 * PRIVATE_KEY_SIZE + 1);
    }

    #[test]
    fn test_key_derivation_message_mainnet_has_no_suffix() {
        assert_eq!(key_derivation_message(1), KEY_DERIVATION_MESSAGE);
    }

    #[test]
    fn test_key_derivation_message_suffixed_elsewhere() {
        let msg = key_derivation_message(4);
        assert!(msg.starts_with(KEY_DERIVATION_MESSAGE));
        assert!(msg.ends_with("\n\nChain ID: 4"));
        assert_ne!(key_derivation_message(4), key_derivation_message(5));
    }

    #[test]
    fn test_native_token_checksum() {
        assert_eq!(
            NATIVE_TOKEN.to_checksum(None),
            "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"
        );
    }
}
