//! Key material containers.
//!
//! These are encoding-level types: they check sizes and tags but not curve
//! membership. `shade-crypto::KeyPair` does the full validation.
//!
//! - [`PublicKeyBytes`]: 65-byte uncompressed SEC1 point
//! - [`SecretKeyBytes`]: 32-byte scalar, zeroized on drop
//! - [`RecipientKeys`]: Spending + viewing public keys of a recipient

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{PRIVATE_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE, UNCOMPRESSED_TAG};
use crate::error::{Result, ShadeError};

/// Strips an optional `0x` prefix.
pub fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Uncompressed secp256k1 public key bytes (`0x04 || x || y`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes {
    bytes: [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE],
}

impl PublicKeyBytes {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    /// Returns error if the length or the leading tag byte is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != UNCOMPRESSED_PUBLIC_KEY_SIZE {
            return Err(ShadeError::InvalidKey(format!(
                "public key must be {} bytes, got {}",
                UNCOMPRESSED_PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != UNCOMPRESSED_TAG {
            return Err(ShadeError::InvalidKey(format!(
                "public key must start with 0x04, got 0x{:02x}",
                bytes[0]
            )));
        }

        let mut arr = [0u8; UNCOMPRESSED_PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Returns the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Creates a public key from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(s))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PublicKeyBytes(0x{}...{})",
            hex::encode(&self.bytes[..8]),
            hex::encode(&self.bytes[UNCOMPRESSED_PUBLIC_KEY_SIZE - 4..])
        )
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECRET KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw private scalar bytes.
///
/// Zeroized when dropped. Never expose this in logs or error messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl SecretKeyBytes {
    /// Creates secret key bytes from a slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(ShadeError::InvalidKey(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; PRIVATE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates secret key bytes from a fixed-size array.
    pub fn from_array(bytes: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(strip_hex_prefix(s))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Returns the raw bytes.
    ///
    /// # Security
    /// Handle the returned bytes carefully - do not log or expose them.
    pub fn as_array(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKeyBytes([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECIPIENT KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Public keys a sender needs to pay a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientKeys {
    /// Spending public key - stealth addresses are derived from it
    pub spending_public_key: PublicKeyBytes,
    /// Viewing public key - random numbers are encrypted to it
    pub viewing_public_key: PublicKeyBytes,
}

impl RecipientKeys {
    /// Creates a recipient key set.
    pub fn new(spending_public_key: PublicKeyBytes, viewing_public_key: PublicKeyBytes) -> Self {
        Self {
            spending_public_key,
            viewing_public_key,
        }
    }
}

/// Options forwarded to the recipient directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOptions {
    /// Resolve keys from the on-chain stealth key registry
    pub advanced: bool,
    /// Accept a raw public key as the recipient identifier
    pub support_pub_key: bool,
    /// Accept a transaction hash and pay its sender
    pub support_tx_hash: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_public() -> Vec<u8> {
        let mut bytes = vec![0x42u8; UNCOMPRESSED_PUBLIC_KEY_SIZE];
        bytes[0] = UNCOMPRESSED_TAG;
        bytes
    }

    #[test]
    fn test_public_key_from_bytes() {
        let bytes = sample_public();
        let pk = PublicKeyBytes::from_bytes(&bytes).unwrap();
        assert_eq!(pk.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn test_public_key_wrong_size() {
        let result = PublicKeyBytes::from_bytes(&[0x04; 33]);
        assert!(matches!(result, Err(ShadeError::InvalidKey(_))));
    }

    #[test]
    fn test_public_key_wrong_tag() {
        let mut bytes = sample_public();
        bytes[0] = 0x02;
        assert!(PublicKeyBytes::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_public_key_hex_accepts_both_prefix_styles() {
        let pk = PublicKeyBytes::from_bytes(&sample_public()).unwrap();
        let with_prefix = pk.to_hex();
        let without_prefix = with_prefix.trim_start_matches("0x").to_string();
        assert_eq!(PublicKeyBytes::from_hex(&with_prefix).unwrap(), pk);
        assert_eq!(PublicKeyBytes::from_hex(&without_prefix).unwrap(), pk);
    }

    #[test]
    fn test_secret_key_debug_redacted() {
        let sk = SecretKeyBytes::from_array([7u8; PRIVATE_KEY_SIZE]);
        let debug = format!("{:?}", sk);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("07"));
    }

    #[test]
    fn test_recipient_keys_serde() {
        let pk = PublicKeyBytes::from_bytes(&sample_public()).unwrap();
        let keys = RecipientKeys::new(pk.clone(), pk);
        let json = serde_json::to_string(&keys).unwrap();
        assert!(json.contains("spendingPublicKey"));
        let back: RecipientKeys = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keys);
    }
}
