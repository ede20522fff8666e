//! secp256k1 key pairs.
//!
//! A [`KeyPair`] holds either a public point alone or a private scalar with
//! its public point. All protocol operations (stealth derivation, ECDH
//! encryption, address derivation, message signing) hang off this type.
//!
//! ## Encodings
//!
//! ```text
//! private:       32-byte big-endian scalar in [1, n-1]
//! uncompressed:  0x04 || x (32) || y (32)
//! compressed:    0x02 | 0x03 || x (32)
//! address:       keccak256(x || y)[12..32]
//! ```

use alloy::primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use shade_core::constants::{
    COMPRESSED_PUBLIC_KEY_SIZE, PREFIX_EVEN, PREFIX_ODD, PRIVATE_KEY_SIZE, SIGNATURE_SIZE,
    UNCOMPRESSED_PUBLIC_KEY_SIZE,
};
use shade_core::error::{Result, ShadeError};
use shade_core::types::{strip_hex_prefix, PublicKeyBytes, SecretKeyBytes};

use crate::encryption::{self, EncryptedPayload};
use crate::hash::keccak256;
use crate::random::RandomNumber;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// A secp256k1 key: public only, or private with its derived public point.
#[derive(Clone)]
pub enum KeyPair {
    /// Private scalar and its public point
    Private {
        /// Private scalar (zeroized on drop)
        secret: SecretKey,
        /// `secret · G`
        public: PublicKey,
    },
    /// Public point only
    Public {
        /// The point
        public: PublicKey,
    },
}

/// A compressed public key split into its prefix byte and x-coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedPublicKey {
    /// `0x02` for even y, `0x03` for odd y
    pub prefix: u8,
    /// x-coordinate
    pub x: B256,
}

impl KeyPair {
    /// Generates a fresh private key pair.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        KeyPair::Private { secret, public }
    }

    /// Builds a private key pair from a 32-byte scalar.
    ///
    /// # Errors
    /// `InvalidKey` for a wrong length, zero, or a value not below the curve order.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(ShadeError::InvalidKey(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| ShadeError::InvalidKey("private key is out of range".into()))?;
        Ok(Self::from_secret(secret))
    }

    /// Builds a private key pair from hex, with or without `0x`.
    pub fn from_private_key(hex_str: &str) -> Result<Self> {
        let bytes = SecretKeyBytes::from_hex(hex_str)?;
        Self::from_private_bytes(bytes.as_array())
    }

    /// Builds a public key pair from a SEC1 encoding (33 or 65 bytes).
    ///
    /// # Errors
    /// `InvalidKey` if the encoding is malformed or the point is not on the curve.
    pub fn from_public_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_PUBLIC_KEY_SIZE && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_SIZE {
            return Err(ShadeError::InvalidKey(format!(
                "public key must be {} or {} bytes, got {}",
                COMPRESSED_PUBLIC_KEY_SIZE,
                UNCOMPRESSED_PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        let public = PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| ShadeError::InvalidKey("public key is not a valid curve point".into()))?;
        Ok(KeyPair::Public { public })
    }

    /// Builds a public key pair from hex, with or without `0x`.
    pub fn from_public_key(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(hex_str))
            .map_err(|e| ShadeError::InvalidKey(format!("public key hex: {e}")))?;
        Self::from_public_bytes(&bytes)
    }

    /// Builds a public key pair from a validated 65-byte container.
    pub fn from_public_key_bytes(key: &PublicKeyBytes) -> Result<Self> {
        Self::from_public_bytes(key.as_bytes())
    }

    /// Rebuilds a public key from its x-coordinate and parity prefix.
    pub fn uncompress_from_x(x: &B256, prefix: u8) -> Result<Self> {
        if prefix != PREFIX_EVEN && prefix != PREFIX_ODD {
            return Err(ShadeError::InvalidKey(format!(
                "compression prefix must be 0x02 or 0x03, got 0x{prefix:02x}"
            )));
        }
        let mut encoded = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
        encoded[0] = prefix;
        encoded[1..].copy_from_slice(x.as_slice());
        Self::from_public_bytes(&encoded)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────────────────

    /// The public point.
    pub fn public_key(&self) -> &PublicKey {
        match self {
            KeyPair::Private { public, .. } | KeyPair::Public { public } => public,
        }
    }

    /// The private scalar, if held.
    pub fn secret_key(&self) -> Option<&SecretKey> {
        match self {
            KeyPair::Private { secret, .. } => Some(secret),
            KeyPair::Public { .. } => None,
        }
    }

    /// Returns true if the private scalar is held.
    pub fn has_private_key(&self) -> bool {
        self.secret_key().is_some()
    }

    /// Drops the private scalar.
    pub fn to_public(&self) -> KeyPair {
        KeyPair::Public {
            public: *self.public_key(),
        }
    }

    /// Uncompressed SEC1 encoding.
    pub fn to_public_key_bytes(&self) -> Result<PublicKeyBytes> {
        let encoded = self.public_key().to_encoded_point(false);
        PublicKeyBytes::from_bytes(encoded.as_bytes())
    }

    /// `0x`-prefixed uncompressed public key.
    pub fn public_key_hex(&self) -> String {
        let encoded = self.public_key().to_encoded_point(false);
        format!("0x{}", hex::encode(encoded.as_bytes()))
    }

    /// Private scalar bytes, if held.
    pub fn secret_bytes(&self) -> Option<SecretKeyBytes> {
        let secret = self.secret_key()?;
        Some(SecretKeyBytes::from_array(secret.to_bytes().into()))
    }

    /// `0x`-prefixed private scalar, if held.
    pub fn private_key_hex(&self) -> Option<String> {
        self.secret_bytes()
            .map(|bytes| format!("0x{}", hex::encode(bytes.as_array())))
    }

    /// x-coordinate of the public point.
    pub fn x_coordinate(&self) -> B256 {
        let encoded = self.public_key().to_encoded_point(true);
        B256::from_slice(&encoded.as_bytes()[1..])
    }

    /// Splits the compressed encoding into prefix and x-coordinate.
    pub fn compress_public_key(&self) -> CompressedPublicKey {
        let encoded = self.public_key().to_encoded_point(true);
        let bytes = encoded.as_bytes();
        CompressedPublicKey {
            prefix: bytes[0],
            x: B256::from_slice(&bytes[1..]),
        }
    }

    /// Address of the public point.
    pub fn address(&self) -> Address {
        public_key_to_address(self.public_key())
    }

    /// EIP-55 checksummed address.
    pub fn checksum_address(&self) -> String {
        self.address().to_checksum(None)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Group operations
    // ───────────────────────────────────────────────────────────────────────────

    /// `scalar · P`, as a public key pair.
    pub fn mul_public_key(&self, scalar: &RandomNumber) -> Result<KeyPair> {
        let factor = scalar.to_nonzero_scalar()?;
        let product = self.public_key().to_projective() * *factor;
        let public = PublicKey::from_affine(product.into())
            .map_err(|_| ShadeError::InvalidKey("point multiplication produced the identity".into()))?;
        Ok(KeyPair::Public { public })
    }

    /// `(d · scalar) mod n`, as a private key pair.
    ///
    /// # Errors
    /// `InvalidKey` if this key pair holds no private scalar.
    pub fn mul_private_key(&self, scalar: &RandomNumber) -> Result<KeyPair> {
        let secret = self
            .secret_key()
            .ok_or_else(|| ShadeError::InvalidKey("private key required for scalar multiplication".into()))?;
        let factor = scalar.to_nonzero_scalar()?;
        let product = *secret.to_nonzero_scalar() * *factor;
        let product: NonZeroScalar = Option::from(NonZeroScalar::new(product))
            .ok_or_else(|| ShadeError::InvalidKey("scalar product is zero".into()))?;
        Ok(Self::from_secret(SecretKey::from(product)))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Encryption
    // ───────────────────────────────────────────────────────────────────────────

    /// Encrypts a random number to this public key under a fresh ephemeral key.
    pub fn encrypt(&self, random_number: &RandomNumber) -> Result<EncryptedPayload> {
        encryption::encrypt(self.public_key(), random_number, &KeyPair::generate())
    }

    /// Encrypts under a caller-supplied ephemeral key.
    pub fn encrypt_with_ephemeral(
        &self,
        random_number: &RandomNumber,
        ephemeral: &KeyPair,
    ) -> Result<EncryptedPayload> {
        encryption::encrypt(self.public_key(), random_number, ephemeral)
    }

    /// Recovers the random number from a payload addressed to this key.
    ///
    /// # Errors
    /// `DecryptionError` if no private scalar is held, the ephemeral key is not
    /// a curve point, or the plaintext is not a valid scalar.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<RandomNumber> {
        let secret = self
            .secret_key()
            .ok_or_else(|| ShadeError::DecryptionError("private key required to decrypt".into()))?;
        encryption::decrypt(secret, payload)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Signing
    // ───────────────────────────────────────────────────────────────────────────

    /// Signs a 32-byte hash (RFC 6979 nonce). `v` is 27 or 28.
    pub fn sign_prehash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature> {
        let secret = self
            .secret_key()
            .ok_or_else(|| ShadeError::SignatureError("private key required to sign".into()))?;
        let signing_key = SigningKey::from(secret);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| ShadeError::SignatureError(e.to_string()))?;
        let rs = signature.to_bytes();
        Ok(RecoverableSignature {
            r: B256::from_slice(&rs[..32]),
            s: B256::from_slice(&rs[32..]),
            v: 27 + recovery_id.to_byte(),
        })
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key() && self.has_private_key() == other.has_private_key()
    }
}

impl Eq for KeyPair {}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.has_private_key() { "Private" } else { "Public" };
        write!(f, "KeyPair::{kind}({})", self.checksum_address())
    }
}

/// Address of a public point.
pub fn public_key_to_address(public: &PublicKey) -> Address {
    let encoded = public.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURES
// ═══════════════════════════════════════════════════════════════════════════════

/// A recoverable ECDSA signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableSignature {
    /// r component
    pub r: B256,
    /// s component (low-s normalized)
    pub s: B256,
    /// Recovery byte, 27 or 28
    pub v: u8,
}

impl RecoverableSignature {
    /// `r || s || v`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// Parses `r || s || v`. Accepts `v` as 0/1 or 27/28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(ShadeError::SignatureError(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        let v = match bytes[64] {
            0 | 1 => bytes[64] + 27,
            27 | 28 => bytes[64],
            other => {
                return Err(ShadeError::SignatureError(format!("invalid recovery byte {other}")))
            }
        };
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v,
        })
    }

    /// `0x`-prefixed `r || s || v`.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Recovers the signer address of a 32-byte hash.
    pub fn recover_address(&self, hash: &[u8; 32]) -> Result<Address> {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(self.r.as_slice());
        rs[32..].copy_from_slice(self.s.as_slice());
        let signature = Signature::from_slice(&rs)
            .map_err(|e| ShadeError::SignatureError(format!("malformed signature: {e}")))?;
        let recovery_id = self
            .v
            .checked_sub(27)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| ShadeError::SignatureError(format!("invalid recovery byte {}", self.v)))?;
        let verifying_key = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
            .map_err(|e| ShadeError::SignatureError(format!("recovery failed: {e}")))?;
        Ok(public_key_to_address(&PublicKey::from(&verifying_key)))
    }
}
