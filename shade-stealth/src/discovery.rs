//! Payment discovery (recipient side).
//!
//! ```text
//! E' = uncompress(0x02 || pkx)
//! r' = decrypt(viewing_sk, E', ciphertext)
//! mine  <=>  address(spending_pk · r') == receiver
//! ```
//!
//! Anyone can publish an announcement, so malformed `pkx` values and
//! ciphertexts that decrypt to an invalid scalar are expected input. They
//! resolve to "not mine" rather than an error.

use subtle::ConstantTimeEq;

use shade_core::error::{Result, ShadeError};
use shade_core::types::Announcement;
use shade_crypto::{derive_stealth_address, EncryptedPayload, KeyPair, RandomNumber};

/// Outcome of testing one announcement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// The payment belongs to the scanning user
    pub is_for_user: bool,
    /// Recovered random number, present only on a match
    pub random_number: Option<RandomNumber>,
}

impl MatchResult {
    fn not_for_user() -> Self {
        Self::default()
    }

    fn matched(random_number: RandomNumber) -> Self {
        Self {
            is_for_user: true,
            random_number: Some(random_number),
        }
    }
}

fn try_match(
    announcement: &Announcement,
    spending_public: &KeyPair,
    viewing: &KeyPair,
) -> Result<Option<RandomNumber>> {
    let payload = EncryptedPayload::from_announcement(&announcement.pkx, &announcement.ciphertext)?;
    let candidate = viewing.decrypt(&payload)?;
    let derived = derive_stealth_address(spending_public, &candidate)?;
    let is_match: bool = derived
        .as_slice()
        .ct_eq(announcement.receiver.as_slice())
        .into();
    Ok(is_match.then_some(candidate))
}

/// Tests whether an announcement pays the holder of `viewing`.
///
/// `spending_public` only needs the public point; `viewing` must hold its
/// private scalar.
///
/// # Errors
/// `InvalidKey` if `viewing` has no private scalar. Cryptographic failures
/// while processing the announcement itself are reported as a non-match.
pub fn match_announcement(
    announcement: &Announcement,
    spending_public: &KeyPair,
    viewing: &KeyPair,
) -> Result<MatchResult> {
    if !viewing.has_private_key() {
        return Err(ShadeError::InvalidKey(
            "viewing private key required to scan announcements".into(),
        ));
    }

    match try_match(announcement, spending_public, viewing) {
        Ok(Some(random_number)) => Ok(MatchResult::matched(random_number)),
        Ok(None) => Ok(MatchResult::not_for_user()),
        Err(e) if e.is_crypto_error() => Ok(MatchResult::not_for_user()),
        Err(e) => Err(e),
    }
}
