//! Random-number encryption and the payload codec.
//!
//! ## Scheme
//!
//! ```text
//! E            = e · G                       (fresh ephemeral key)
//! shared       = x(e · V) = x(v · E)         (ECDH, x-coordinate only)
//! key          = keccak256(shared)
//! ciphertext   = r XOR key
//! ```
//!
//! Only the x-coordinate of the ECDH point enters the key. `v · (-E)` has the
//! same x-coordinate as `v · E`, so an ephemeral key rebuilt from an
//! announcement's `pkx` with a fixed `0x02` prefix decrypts correctly whatever
//! the parity of the original point.
//!
//! The ciphertext carries no MAC. A wrong key yields a different scalar (or a
//! value outside the scalar range); callers authenticate the result by
//! recomputing the stealth address.
//!
//! ## Wire Forms
//!
//! ```text
//! JSON:   { "ephemeralPublicKey": "0x04…", "ciphertext": "0x…" }
//! binary: ephemeral (65) || ciphertext (32)
//! ```

use alloy::primitives::B256;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use shade_core::constants::{
    ANNOUNCEMENT_PKX_PREFIX, CIPHERTEXT_SIZE, COMPRESSED_PUBLIC_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE,
};
use shade_core::error::{Result, ShadeError};
use shade_core::types::PublicKeyBytes;

use crate::hash::keccak256;
use crate::keys::KeyPair;
use crate::random::RandomNumber;

/// Size of the binary payload encoding.
pub const ENCODED_PAYLOAD_SIZE: usize = UNCOMPRESSED_PUBLIC_KEY_SIZE + CIPHERTEXT_SIZE;

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Ephemeral public key plus encrypted random number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Uncompressed ephemeral public key
    pub ephemeral_public_key: PublicKeyBytes,
    /// `r XOR keccak256(shared secret)`
    pub ciphertext: B256,
}

impl EncryptedPayload {
    /// Creates a payload from its parts.
    pub fn new(ephemeral_public_key: PublicKeyBytes, ciphertext: B256) -> Self {
        Self {
            ephemeral_public_key,
            ciphertext,
        }
    }

    /// Rebuilds a payload from the `pkx` and `ciphertext` of an announcement.
    ///
    /// # Errors
    /// `DecryptionError` if `pkx` is not the x-coordinate of a curve point.
    pub fn from_announcement(pkx: &B256, ciphertext: &B256) -> Result<Self> {
        let ephemeral = KeyPair::uncompress_from_x(pkx, ANNOUNCEMENT_PKX_PREFIX)
            .map_err(|e| ShadeError::DecryptionError(format!("announcement pkx: {e}")))?;
        Ok(Self::new(ephemeral.to_public_key_bytes()?, *ciphertext))
    }

    /// x-coordinate of the ephemeral key, as published in announcements.
    pub fn pkx(&self) -> B256 {
        B256::from_slice(&self.ephemeral_public_key.as_bytes()[1..1 + CIPHERTEXT_SIZE])
    }

    /// `ephemeral (65) || ciphertext (32)`.
    pub fn to_bytes(&self) -> [u8; ENCODED_PAYLOAD_SIZE] {
        let mut out = [0u8; ENCODED_PAYLOAD_SIZE];
        out[..UNCOMPRESSED_PUBLIC_KEY_SIZE].copy_from_slice(self.ephemeral_public_key.as_bytes());
        out[UNCOMPRESSED_PUBLIC_KEY_SIZE..].copy_from_slice(self.ciphertext.as_slice());
        out
    }

    /// Parses the binary encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCODED_PAYLOAD_SIZE {
            return Err(ShadeError::DecryptionError(format!(
                "encrypted payload must be {} bytes, got {}",
                ENCODED_PAYLOAD_SIZE,
                bytes.len()
            )));
        }
        let ephemeral = PublicKeyBytes::from_bytes(&bytes[..UNCOMPRESSED_PUBLIC_KEY_SIZE])
            .map_err(|e| ShadeError::DecryptionError(e.to_string()))?;
        Ok(Self::new(
            ephemeral,
            B256::from_slice(&bytes[UNCOMPRESSED_PUBLIC_KEY_SIZE..]),
        ))
    }

    /// Serializes to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses the JSON wire form.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| ShadeError::DecryptionError(format!("encrypted payload: {e}")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCRYPT / DECRYPT
// ═══════════════════════════════════════════════════════════════════════════════

fn shared_secret_x(point: &PublicKey, scalar: &SecretKey) -> Result<[u8; 32]> {
    let product = AffinePoint::from(point.to_projective() * *scalar.to_nonzero_scalar());
    let encoded = product.to_encoded_point(true);
    let bytes = encoded.as_bytes();
    if bytes.len() != COMPRESSED_PUBLIC_KEY_SIZE {
        return Err(ShadeError::DecryptionError("shared secret is the identity".into()));
    }
    let mut x = [0u8; 32];
    x.copy_from_slice(&bytes[1..]);
    Ok(x)
}

fn xor_with_key(data: &[u8; 32], shared_x: &[u8; 32]) -> [u8; 32] {
    let key = keccak256(shared_x);
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = data[i] ^ key[i];
    }
    out
}

/// Encrypts `random_number` to `recipient` using `ephemeral`'s private scalar.
pub(crate) fn encrypt(
    recipient: &PublicKey,
    random_number: &RandomNumber,
    ephemeral: &KeyPair,
) -> Result<EncryptedPayload> {
    let ephemeral_secret = ephemeral
        .secret_key()
        .ok_or_else(|| ShadeError::InvalidKey("ephemeral key must hold a private scalar".into()))?;
    let shared_x = shared_secret_x(recipient, ephemeral_secret)?;
    let ciphertext = xor_with_key(random_number.as_bytes(), &shared_x);
    Ok(EncryptedPayload::new(
        ephemeral.to_public_key_bytes()?,
        B256::from(ciphertext),
    ))
}

/// Decrypts a payload with the recipient's private scalar.
pub(crate) fn decrypt(secret: &SecretKey, payload: &EncryptedPayload) -> Result<RandomNumber> {
    let ephemeral = PublicKey::from_sec1_bytes(payload.ephemeral_public_key.as_bytes())
        .map_err(|_| ShadeError::DecryptionError("ephemeral key is not a curve point".into()))?;
    let shared_x = shared_secret_x(&ephemeral, secret)?;
    let plaintext = xor_with_key(&payload.ciphertext.0, &shared_x);
    RandomNumber::from_bytes(&plaintext)
        .map_err(|e| ShadeError::DecryptionError(format!("plaintext is not a valid scalar: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::constants::PREFIX_ODD;

    #[test]
    fn test_roundtrip() {
        let viewing = KeyPair::generate();
        let r = RandomNumber::generate();
        let payload = viewing.to_public().encrypt(&r).unwrap();
        assert_eq!(viewing.decrypt(&payload).unwrap(), r);
    }

    #[test]
    fn test_wrong_key_never_yields_plaintext() {
        let viewing = KeyPair::generate();
        let other = KeyPair::generate();
        let r = RandomNumber::generate();
        let payload = viewing.encrypt(&r).unwrap();

        match other.decrypt(&payload) {
            Ok(candidate) => assert_ne!(candidate, r),
            Err(e) => assert!(matches!(e, ShadeError::DecryptionError(_))),
        }
    }

    #[test]
    fn test_fixed_prefix_recovers_odd_ephemeral() {
        let viewing = KeyPair::generate();
        let r = RandomNumber::generate();

        let ephemeral = loop {
            let candidate = KeyPair::generate();
            if candidate.compress_public_key().prefix == PREFIX_ODD {
                break candidate;
            }
        };
        let payload = viewing.encrypt_with_ephemeral(&r, &ephemeral).unwrap();
        let rebuilt = EncryptedPayload::from_announcement(&payload.pkx(), &payload.ciphertext).unwrap();

        assert_ne!(rebuilt.ephemeral_public_key, payload.ephemeral_public_key);
        assert_eq!(viewing.decrypt(&rebuilt).unwrap(), r);
    }

    #[test]
    fn test_binary_codec() {
        let payload = KeyPair::generate().encrypt(&RandomNumber::generate()).unwrap();
        let bytes = payload.to_bytes();
        assert_eq!(bytes[0], 0x04);
        assert_eq!(EncryptedPayload::from_bytes(&bytes).unwrap(), payload);
        assert!(matches!(
            EncryptedPayload::from_bytes(&bytes[..96]),
            Err(ShadeError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_json_codec() {
        let payload = KeyPair::generate().encrypt(&RandomNumber::generate()).unwrap();
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"ephemeralPublicKey\":\"0x04"));
        assert!(json.contains("\"ciphertext\":\"0x"));
        assert_eq!(EncryptedPayload::from_json(&json).unwrap(), payload);
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let payload = KeyPair::generate().encrypt(&RandomNumber::generate()).unwrap();
        let json = format!(
            r#"{{"ephemeralPublicKey":"{}","ciphertext":"0x1234"}}"#,
            payload.ephemeral_public_key.to_hex()
        );
        assert!(matches!(
            EncryptedPayload::from_json(&json),
            Err(ShadeError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_invalid_ephemeral_point_is_decryption_error() {
        let viewing = KeyPair::generate();
        let mut bad = [0u8; 65];
        bad[0] = 0x04;
        bad[1] = 1;
        let payload = EncryptedPayload::new(PublicKeyBytes::from_bytes(&bad).unwrap(), B256::ZERO);
        assert!(matches!(
            viewing.decrypt(&payload),
            Err(ShadeError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_pkx_not_on_curve() {
        // Above the field modulus.
        let result = EncryptedPayload::from_announcement(&B256::repeat_byte(0xff), &B256::ZERO);
        assert!(matches!(result, Err(ShadeError::DecryptionError(_))));
    }
}
