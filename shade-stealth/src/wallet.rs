//! SHADE key management.
//!
//! A user's spending and viewing keys are derived from a wallet signature
//! over a fixed message, so they can be regenerated from the wallet alone:
//!
//! ```text
//! signature      = sign(message(chain_id))      (r || s || v)
//! spending_key   = keccak256(r)
//! viewing_key    = keccak256(s)
//! ```
//!
//! Regeneration only reproduces the same keys when the wallet signs
//! deterministically (RFC 6979).

use tracing::{debug, instrument};

use shade_core::constants::{key_derivation_message, SIGNATURE_SIZE};
use shade_core::error::{Result, ShadeError};
use shade_core::traits::MessageSigner;
use shade_core::types::{Announcement, RecipientKeys};
use shade_crypto::{derive_stealth_private_key, keccak256, KeyPair};

use crate::discovery::match_announcement;

/// A user's spending and viewing key pairs.
#[derive(Clone, Debug)]
pub struct ShadeKeys {
    /// Controls funds at stealth addresses
    pub spending: KeyPair,
    /// Decrypts announcements (can be shared with an auditor)
    pub viewing: KeyPair,
}

impl ShadeKeys {
    /// Generates random keys.
    pub fn generate() -> Self {
        Self {
            spending: KeyPair::generate(),
            viewing: KeyPair::generate(),
        }
    }

    /// Creates keys from existing key pairs.
    pub fn new(spending: KeyPair, viewing: KeyPair) -> Self {
        Self { spending, viewing }
    }

    /// Derives keys from a 65-byte `r || s || v` signature.
    ///
    /// # Errors
    /// `InputValidation` for a wrong length, `InvalidKey` if a hash is not a
    /// valid scalar.
    pub fn from_signature(signature: &[u8]) -> Result<Self> {
        if signature.len() != SIGNATURE_SIZE {
            return Err(ShadeError::InputValidation(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                signature.len()
            )));
        }
        let spending = KeyPair::from_private_bytes(&keccak256(&signature[..32]))?;
        let viewing = KeyPair::from_private_bytes(&keccak256(&signature[32..64]))?;
        Ok(Self { spending, viewing })
    }

    /// Public keys to publish so others can pay this user.
    pub fn recipient_keys(&self) -> Result<RecipientKeys> {
        Ok(RecipientKeys::new(
            self.spending.to_public_key_bytes()?,
            self.viewing.to_public_key_bytes()?,
        ))
    }

    /// Tests an announcement and, on a match, returns the stealth private key.
    pub fn try_discover(&self, announcement: &Announcement) -> Result<Option<KeyPair>> {
        let result = match_announcement(announcement, &self.spending, &self.viewing)?;
        match result.random_number {
            Some(random_number) => Ok(Some(derive_stealth_private_key(&self.spending, &random_number)?)),
            None => Ok(None),
        }
    }
}

/// Derives a user's keys by having their wallet sign the key derivation message.
#[instrument(skip(signer), fields(address = %signer.address(), chain_id = signer.chain_id()))]
pub async fn generate_private_keys(signer: &dyn MessageSigner) -> Result<ShadeKeys> {
    let message = key_derivation_message(signer.chain_id());
    let signature = signer.sign_message(message.as_bytes()).await?;
    let keys = ShadeKeys::from_signature(&signature)?;
    debug!("Derived spending and viewing keys from signature");
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::constants::NATIVE_TOKEN;
    use shade_core::U256;
    use shade_crypto::{Denylist, LocalSigner};

    use crate::payment::prepare_stealth_payment;

    const WALLET_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    #[tokio::test]
    async fn test_chain_id_changes_keys() {
        let mainnet = LocalSigner::from_private_key(WALLET_KEY, 1).unwrap();
        let testnet = LocalSigner::from_private_key(WALLET_KEY, 4).unwrap();

        let a = generate_private_keys(&mainnet).await.unwrap();
        let b = generate_private_keys(&testnet).await.unwrap();

        assert_ne!(a.spending.address(), b.spending.address());
        assert_ne!(a.viewing.address(), b.viewing.address());
    }

    #[tokio::test]
    async fn test_regeneration_is_deterministic() {
        let signer = LocalSigner::from_private_key(WALLET_KEY, 1).unwrap();
        let a = generate_private_keys(&signer).await.unwrap();
        let b = generate_private_keys(&signer).await.unwrap();
        assert_eq!(a.spending.private_key_hex(), b.spending.private_key_hex());
        assert_eq!(a.viewing.private_key_hex(), b.viewing.private_key_hex());
    }

    #[test]
    fn test_signature_and_signer_paths_agree() {
        let signer = LocalSigner::from_private_key(WALLET_KEY, 1).unwrap();
        let signature = signer.sign_message_sync(key_derivation_message(1).as_bytes()).unwrap();
        let direct = ShadeKeys::from_signature(&signature).unwrap();
        let derived = tokio_test::block_on(generate_private_keys(&signer)).unwrap();
        assert_eq!(direct.spending.address(), derived.spending.address());
        assert_eq!(direct.viewing.address(), derived.viewing.address());
    }

    #[test]
    fn test_from_signature_splits_r_and_s() {
        let mut signature = [0u8; 65];
        signature[..32].fill(0x01);
        signature[32..64].fill(0x02);
        signature[64] = 27;

        let keys = ShadeKeys::from_signature(&signature).unwrap();
        let expected_spending = KeyPair::from_private_bytes(&keccak256(&[0x01; 32])).unwrap();
        let expected_viewing = KeyPair::from_private_bytes(&keccak256(&[0x02; 32])).unwrap();
        assert_eq!(keys.spending, expected_spending);
        assert_eq!(keys.viewing, expected_viewing);
    }

    #[test]
    fn test_from_signature_wrong_length() {
        assert!(matches!(
            ShadeKeys::from_signature(&[0u8; 64]),
            Err(ShadeError::InputValidation(_))
        ));
    }

    #[test]
    fn test_try_discover_returns_stealth_key() {
        let keys = ShadeKeys::generate();
        let payment = prepare_stealth_payment(&keys.recipient_keys().unwrap(), &Denylist::default()).unwrap();
        let announcement = payment.announcement(U256::from(7u64), NATIVE_TOKEN);

        let stealth = keys.try_discover(&announcement).unwrap().unwrap();
        assert_eq!(stealth.address(), payment.stealth_address);

        let stranger = ShadeKeys::generate();
        assert!(stranger.try_discover(&announcement).unwrap().is_none());
    }
}
