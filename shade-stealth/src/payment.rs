//! Stealth payment preparation (sender side).

use tracing::{debug, warn};

use shade_core::constants::MAX_STEALTH_ATTEMPTS;
use shade_core::error::{Result, ShadeError};
use shade_core::types::{Announcement, RecipientKeys};
use shade_core::{Address, B256, U256};
use shade_crypto::{derive_checked_stealth_key, Denylist, EncryptedPayload, KeyPair, RandomNumber};

/// Everything a sender needs to pay a recipient privately.
#[derive(Clone, Debug)]
pub struct StealthPayment {
    /// The one-time stealth public key
    pub stealth_key: KeyPair,
    /// Address funds are sent to
    pub stealth_address: Address,
    /// The random number (keep it to prove the payment, never publish it)
    pub random_number: RandomNumber,
    /// Random number encrypted to the recipient's viewing key
    pub payload: EncryptedPayload,
}

impl StealthPayment {
    /// x-coordinate of the ephemeral key, as announced.
    pub fn pkx(&self) -> B256 {
        self.payload.pkx()
    }

    /// Encrypted random number, as announced.
    pub fn ciphertext(&self) -> B256 {
        self.payload.ciphertext
    }

    /// The announcement the settlement contract will emit for this payment.
    pub fn announcement(&self, amount: U256, token: Address) -> Announcement {
        Announcement {
            receiver: self.stealth_address,
            amount,
            token,
            pkx: self.pkx(),
            ciphertext: self.ciphertext(),
        }
    }
}

/// Prepares a payment with a fresh random number, regenerating on denylist hits.
pub fn prepare_stealth_payment(recipient: &RecipientKeys, denylist: &Denylist) -> Result<StealthPayment> {
    StealthPaymentBuilder::new()
        .recipient(recipient.clone())
        .denylist(denylist.clone())
        .build()
}

/// Builder for [`StealthPayment`].
#[derive(Default)]
pub struct StealthPaymentBuilder {
    recipient: Option<RecipientKeys>,
    denylist: Denylist,
    random_number: Option<RandomNumber>,
    max_attempts: Option<usize>,
}

impl StealthPaymentBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipient's published keys.
    pub fn recipient(mut self, recipient: RecipientKeys) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Sets the addresses that must not be paid.
    pub fn denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// Uses a fixed random number instead of drawing one. Only one attempt is made.
    pub fn random_number(mut self, random_number: RandomNumber) -> Self {
        self.random_number = Some(random_number);
        self
    }

    /// Caps how many random numbers are drawn before giving up.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Builds the payment.
    ///
    /// # Errors
    /// - `InputValidation` if no recipient was set
    /// - `InvalidKey` if the recipient's keys are not curve points
    /// - `UnsafeAddress` if every attempt landed on the denylist
    pub fn build(self) -> Result<StealthPayment> {
        let recipient = self
            .recipient
            .ok_or_else(|| ShadeError::InputValidation("recipient keys are required".into()))?;
        let spending = KeyPair::from_public_key_bytes(&recipient.spending_public_key)?;
        let viewing = KeyPair::from_public_key_bytes(&recipient.viewing_public_key)?;

        if let Some(random_number) = self.random_number {
            return assemble(&spending, &viewing, random_number, &self.denylist);
        }

        let attempts = self.max_attempts.unwrap_or(MAX_STEALTH_ATTEMPTS);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match assemble(&spending, &viewing, RandomNumber::generate(), &self.denylist) {
                Err(ShadeError::UnsafeAddress(address)) => {
                    warn!(attempt, %address, "Stealth address is denylisted, regenerating");
                    last_error = Some(ShadeError::UnsafeAddress(address));
                }
                other => return other,
            }
        }
        Err(last_error.unwrap_or_else(|| ShadeError::Internal("no stealth attempts were made".into())))
    }
}

fn assemble(
    spending: &KeyPair,
    viewing: &KeyPair,
    random_number: RandomNumber,
    denylist: &Denylist,
) -> Result<StealthPayment> {
    let payload = viewing.encrypt(&random_number)?;
    let stealth_key = derive_checked_stealth_key(spending, &random_number, denylist)?;
    let stealth_address = stealth_key.address();
    debug!(%stealth_address, "Prepared stealth payment");

    Ok(StealthPayment {
        stealth_key,
        stealth_address,
        random_number,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::constants::NATIVE_TOKEN;

    fn recipient() -> (KeyPair, KeyPair, RecipientKeys) {
        let spending = KeyPair::generate();
        let viewing = KeyPair::generate();
        let keys = RecipientKeys::new(
            spending.to_public_key_bytes().unwrap(),
            viewing.to_public_key_bytes().unwrap(),
        );
        (spending, viewing, keys)
    }

    #[test]
    fn test_prepare_payment() {
        let (spending, viewing, keys) = recipient();
        let payment = prepare_stealth_payment(&keys, &Denylist::default()).unwrap();

        assert!(!payment.stealth_key.has_private_key());
        let recovered = viewing.decrypt(&payment.payload).unwrap();
        assert_eq!(recovered, payment.random_number);
        assert_eq!(
            spending.mul_private_key(&recovered).unwrap().address(),
            payment.stealth_address
        );
    }

    #[test]
    fn test_each_payment_is_fresh() {
        let (_, _, keys) = recipient();
        let a = prepare_stealth_payment(&keys, &Denylist::default()).unwrap();
        let b = prepare_stealth_payment(&keys, &Denylist::default()).unwrap();
        assert_ne!(a.stealth_address, b.stealth_address);
        assert_ne!(a.pkx(), b.pkx());
    }

    #[test]
    fn test_fixed_random_number() {
        let (spending, _, keys) = recipient();
        let one = RandomNumber::from_hex("0x01").unwrap();
        let payment = StealthPaymentBuilder::new()
            .recipient(keys)
            .random_number(one)
            .build()
            .unwrap();
        assert_eq!(payment.stealth_address, spending.address());
    }

    #[test]
    fn test_denylisted_fixed_random_number_is_unsafe() {
        let (spending, _, keys) = recipient();
        let result = StealthPaymentBuilder::new()
            .recipient(keys)
            .random_number(RandomNumber::from_hex("0x01").unwrap())
            .denylist(Denylist::from_addresses([spending.address()]))
            .build();
        assert!(matches!(result, Err(ShadeError::UnsafeAddress(_))));
    }

    #[test]
    fn test_missing_recipient() {
        assert!(matches!(
            StealthPaymentBuilder::new().build(),
            Err(ShadeError::InputValidation(_))
        ));
    }

    #[test]
    fn test_announcement_fields() {
        let (_, _, keys) = recipient();
        let payment = prepare_stealth_payment(&keys, &Denylist::default()).unwrap();
        let announcement = payment.announcement(U256::from(5u64), NATIVE_TOKEN);
        assert_eq!(announcement.receiver, payment.stealth_address);
        assert_eq!(announcement.pkx, payment.pkx());
        assert!(announcement.is_native());
    }
}
