//! Meta-withdrawal authorization.
//!
//! A stealth address holding tokens has no native balance for gas. Its owner
//! signs an authorization and a relayer (the sponsor) submits the withdrawal,
//! taking `sponsor_fee` out of the amount.
//!
//! ## Digest
//!
//! ```text
//! digest = keccak256(abi.encode(
//!     uint256 chainId, address contract, address acceptor, address token,
//!     address sponsor, uint256 sponsorFee, address hook, bytes hookData))
//!
//! signature = sign(keccak256("\x19Ethereum Signed Message:\n32" || digest))
//! ```

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use shade_core::error::{Result, ShadeError};
use shade_core::types::{parse_address, parse_chain_id};

use crate::hash::{eip191_hash, keccak256};
use crate::keys::{KeyPair, RecoverableSignature};

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Fields covered by a meta-withdrawal signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawAuthorization {
    /// Chain the withdrawal is valid on
    pub chain_id: u64,
    /// Settlement contract
    pub contract: Address,
    /// Destination of the withdrawn tokens
    pub acceptor: Address,
    /// Token being withdrawn
    pub token: Address,
    /// Relayer submitting the transaction
    pub sponsor: Address,
    /// Fee paid to the sponsor, in token base units
    pub sponsor_fee: U256,
    /// Contract called after the withdrawal, or zero
    pub hook: Address,
    /// Call data passed to the hook
    pub hook_data: Bytes,
}

impl WithdrawAuthorization {
    /// Creates an authorization without a hook.
    pub fn new(
        chain_id: u64,
        contract: Address,
        acceptor: Address,
        token: Address,
        sponsor: Address,
        sponsor_fee: U256,
    ) -> Self {
        Self {
            chain_id,
            contract,
            acceptor,
            token,
            sponsor,
            sponsor_fee,
            hook: Address::ZERO,
            hook_data: Bytes::new(),
        }
    }

    /// Attaches a post-withdrawal hook call.
    pub fn with_hook(mut self, hook: Address, hook_data: Bytes) -> Self {
        self.hook = hook;
        self.hook_data = hook_data;
        self
    }

    /// Returns true if a hook call is attached.
    pub fn has_hook(&self) -> bool {
        self.hook != Address::ZERO || !self.hook_data.is_empty()
    }

    /// Canonical digest of the authorization.
    pub fn digest(&self) -> B256 {
        let encoded = (
            U256::from(self.chain_id),
            self.contract,
            self.acceptor,
            self.token,
            self.sponsor,
            self.sponsor_fee,
            self.hook,
            self.hook_data.clone(),
        )
            .abi_encode_params();
        B256::from(keccak256(&encoded))
    }

    /// Hash that is actually signed (EIP-191 over the digest).
    pub fn signing_hash(&self) -> [u8; 32] {
        eip191_hash(self.digest().as_slice())
    }
}

/// String form of an authorization, as received from a relayer or the CLI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWithdrawAuthorization {
    /// Decimal chain ID
    pub chain_id: String,
    /// Settlement contract
    pub contract: String,
    /// Destination
    pub acceptor: String,
    /// Token
    pub token: String,
    /// Sponsor
    pub sponsor: String,
    /// Decimal sponsor fee
    pub sponsor_fee: String,
    /// Hook contract
    #[serde(default)]
    pub hook: Option<String>,
    /// `0x`-prefixed hook call data
    #[serde(default)]
    pub hook_data: Option<String>,
}

impl TryFrom<&RawWithdrawAuthorization> for WithdrawAuthorization {
    type Error = ShadeError;

    fn try_from(raw: &RawWithdrawAuthorization) -> Result<Self> {
        let chain_id = parse_chain_id(&raw.chain_id)?;
        let hook_data = match raw.hook_data.as_deref() {
            Some(data) => parse_hook_data(data)?,
            None => Bytes::new(),
        };
        let hook = match raw.hook.as_deref() {
            Some(hook) => parse_address(hook)?,
            None => Address::ZERO,
        };
        let sponsor_fee = U256::from_str_radix(raw.sponsor_fee.trim(), 10).map_err(|e| {
            ShadeError::InputValidation(format!("sponsor fee '{}': {e}", raw.sponsor_fee))
        })?;

        Ok(Self::new(
            chain_id,
            parse_address(&raw.contract)?,
            parse_address(&raw.acceptor)?,
            parse_address(&raw.token)?,
            parse_address(&raw.sponsor)?,
            sponsor_fee,
        )
        .with_hook(hook, hook_data))
    }
}

/// Parses hook call data. Requires `0x` and an even number of hex digits.
pub fn parse_hook_data(s: &str) -> Result<Bytes> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").ok_or_else(|| {
        ShadeError::InputValidation(format!("hook data '{trimmed}' must be 0x-prefixed hex"))
    })?;
    if digits.len() % 2 != 0 {
        return Err(ShadeError::InputValidation(format!(
            "hook data '{trimmed}' has an odd number of hex digits"
        )));
    }
    let bytes = hex::decode(digits)
        .map_err(|e| ShadeError::InputValidation(format!("hook data '{trimmed}': {e}")))?;
    Ok(Bytes::from(bytes))
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGN / RECOVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Signs a withdrawal authorization with the stealth private key.
///
/// # Errors
/// `SignatureError` if the key pair holds no private scalar.
pub fn sign_withdraw(
    stealth: &KeyPair,
    authorization: &WithdrawAuthorization,
) -> Result<RecoverableSignature> {
    let signature = stealth.sign_prehash(&authorization.signing_hash())?;
    debug!(
        stealth = %stealth.address(),
        sponsor = %authorization.sponsor,
        "Signed meta-withdrawal"
    );
    Ok(signature)
}

/// Recovers the stealth address that signed an authorization.
pub fn recover_withdraw_signer(
    authorization: &WithdrawAuthorization,
    signature: &RecoverableSignature,
) -> Result<Address> {
    signature.recover_address(&authorization.signing_hash())
}
