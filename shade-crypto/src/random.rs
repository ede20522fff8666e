//! Per-payment random numbers.
//!
//! A [`RandomNumber`] is a nonzero secp256k1 scalar. The sender multiplies the
//! recipient's spending key by it to get the stealth key, and encrypts it to
//! the recipient's viewing key so the recipient can do the same.

use alloy::primitives::B256;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, Scalar};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use shade_core::constants::PRIVATE_KEY_SIZE;
use shade_core::error::{Result, ShadeError};
use shade_core::types::strip_hex_prefix;

/// A 32-byte scalar in `[1, n-1]`. One per payment, never reused.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RandomNumber {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl RandomNumber {
    /// Generates a fresh random number from the OS RNG.
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generates a random number from the supplied RNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let scalar = NonZeroScalar::random(rng);
        Self {
            bytes: scalar.to_repr().into(),
        }
    }

    /// Builds a random number from big-endian bytes.
    ///
    /// # Errors
    /// `InputValidation` if the length is not 32, or the value is zero or not
    /// below the curve order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(ShadeError::InputValidation(format!(
                "random number must be {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; PRIVATE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        let candidate = Self { bytes: arr };
        candidate.to_nonzero_scalar()?;
        Ok(candidate)
    }

    /// Parses hex, with or without `0x`. Short values are left-padded.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = strip_hex_prefix(s);
        if digits.is_empty() || digits.len() > PRIVATE_KEY_SIZE * 2 {
            return Err(ShadeError::InputValidation(format!(
                "random number must be 1 to 64 hex digits, got {}",
                digits.len()
            )));
        }
        let padded = format!("{digits:0>64}");
        let mut bytes = hex::decode(padded)
            .map_err(|e| ShadeError::InputValidation(format!("random number hex: {e}")))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Returns the big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }

    /// Returns the value as a 32-byte word.
    pub fn to_b256(&self) -> B256 {
        B256::from(self.bytes)
    }

    /// `0x`-prefixed, 64 hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Returns the value as a curve scalar.
    pub fn to_nonzero_scalar(&self) -> Result<NonZeroScalar> {
        let repr = FieldBytes::clone_from_slice(&self.bytes);
        let scalar: Option<Scalar> = Scalar::from_repr(repr).into();
        let scalar = scalar.ok_or_else(|| {
            ShadeError::InputValidation("random number is not below the curve order".into())
        })?;
        Option::<NonZeroScalar>::from(NonZeroScalar::new(scalar))
            .ok_or_else(|| ShadeError::InputValidation("random number must be nonzero".into()))
    }
}

impl std::fmt::Debug for RandomNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RandomNumber([REDACTED])")
    }
}

impl TryFrom<B256> for RandomNumber {
    type Error = ShadeError;

    fn try_from(value: B256) -> Result<Self> {
        Self::from_bytes(value.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    #[test]
    fn test_generate_is_valid_and_fresh() {
        let a = RandomNumber::generate();
        let b = RandomNumber::generate();
        assert_ne!(a, b);
        assert!(a.to_nonzero_scalar().is_ok());
        assert_eq!(a.to_hex().len(), 66);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = RandomNumber::generate_with_rng(&mut ChaCha20Rng::seed_from_u64(7));
        let b = RandomNumber::generate_with_rng(&mut ChaCha20Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_zero() {
        assert!(matches!(
            RandomNumber::from_bytes(&[0u8; 32]),
            Err(ShadeError::InputValidation(_))
        ));
    }

    #[test]
    fn test_rejects_curve_order() {
        assert!(RandomNumber::from_hex(CURVE_ORDER).is_err());
    }

    #[test]
    fn test_accepts_order_minus_one() {
        let max = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140";
        assert!(RandomNumber::from_hex(max).is_ok());
    }

    #[test]
    fn test_short_hex_is_left_padded() {
        let one = RandomNumber::from_hex("0x01").unwrap();
        assert_eq!(one.to_b256(), B256::with_last_byte(1));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(RandomNumber::from_bytes(&[1u8; 31]).is_err());
        assert!(RandomNumber::from_hex(&"1".repeat(65)).is_err());
    }

    #[test]
    fn test_debug_redacted() {
        let r = RandomNumber::from_hex("0x01").unwrap();
        assert_eq!(format!("{r:?}"), "RandomNumber([REDACTED])");
    }
}
