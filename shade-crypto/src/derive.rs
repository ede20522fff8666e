//! Stealth key and address derivation.
//!
//! ## Derivation Flow
//!
//! ```text
//! sender:     stealth_pk  = spending_pk · r
//!             address     = keccak256(stealth_pk)[12..32]
//!
//! recipient:  stealth_sk  = spending_sk · r  (mod n)
//!             address(stealth_sk · G) == address
//! ```
//!
//! The stealth address is a pure function of the spending public key and the
//! random number. Every address computed here is screened against a
//! [`Denylist`] before it is handed out.

use alloy::primitives::Address;
use subtle::ConstantTimeEq;

use shade_core::error::{Result, ShadeError};

use crate::denylist::Denylist;
use crate::keys::KeyPair;
use crate::random::RandomNumber;

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PUBLIC KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the stealth public key `spending_pk · r`.
pub fn derive_stealth_public_key(spending: &KeyPair, random_number: &RandomNumber) -> Result<KeyPair> {
    spending.mul_public_key(random_number)
}

/// Derives the stealth address for a payment.
pub fn derive_stealth_address(spending: &KeyPair, random_number: &RandomNumber) -> Result<Address> {
    Ok(derive_stealth_public_key(spending, random_number)?.address())
}

/// Derives the stealth public key and rejects denylisted addresses.
///
/// # Errors
/// `UnsafeAddress` if the derived address is on the denylist. The caller
/// should draw a new random number and try again.
pub fn derive_checked_stealth_key(
    spending: &KeyPair,
    random_number: &RandomNumber,
    denylist: &Denylist,
) -> Result<KeyPair> {
    let stealth = derive_stealth_public_key(spending, random_number)?;
    denylist.check(&stealth.address())?;
    Ok(stealth)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PRIVATE KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the stealth private key `spending_sk · r mod n`.
///
/// # Security
///
/// The result controls the funds at the stealth address. Its scalar is
/// zeroized when dropped.
pub fn derive_stealth_private_key(spending: &KeyPair, random_number: &RandomNumber) -> Result<KeyPair> {
    if !spending.has_private_key() {
        return Err(ShadeError::InvalidKey(
            "spending private key required to derive a stealth private key".into(),
        ));
    }
    spending.mul_private_key(random_number)
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Checks that `expected` is the stealth address of `spending` and `r`.
pub fn verify_stealth_address(
    spending: &KeyPair,
    random_number: &RandomNumber,
    expected: &Address,
) -> Result<bool> {
    let derived = derive_stealth_address(spending, random_number)?;
    Ok(derived.as_slice().ct_eq(expected.as_slice()).into())
}
