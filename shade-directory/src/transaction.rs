//! Legacy (EIP-155) transaction signing.
//!
//! Used to send transactions from stealth addresses, whose keys never leave
//! the client. Field layout and RLP come from `alloy::consensus::TxLegacy`.

use alloy::consensus::{SignableTransaction, TxLegacy};
use alloy::primitives::{Address, Bytes, Signature, TxKind, U256};

use shade_core::error::{Result, ShadeError};
use shade_crypto::KeyPair;

/// Unsigned legacy transaction fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient
    pub to: Address,
    /// Value in wei
    pub value: U256,
    /// Call data
    pub data: Bytes,
    /// EIP-155 chain ID
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn to_consensus(&self) -> Result<TxLegacy> {
        let gas_price = u128::try_from(self.gas_price)
            .map_err(|_| ShadeError::InputValidation(format!("gas price {} out of range", self.gas_price)))?;
        Ok(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price,
            gas_limit: u128::from(self.gas_limit),
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.data.clone(),
        })
    }

    /// RLP payload hashed for signing: the fields followed by `chain_id, 0, 0`.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        Ok(self.to_consensus()?.encoded_for_signing())
    }

    /// Hash the sender signs.
    pub fn signing_hash(&self) -> Result<[u8; 32]> {
        Ok(self.to_consensus()?.signature_hash().0)
    }

    /// Signs and returns the raw transaction for `eth_sendRawTransaction`.
    ///
    /// # Errors
    /// `SignatureError` if `key` holds no private scalar.
    pub fn sign(&self, key: &KeyPair) -> Result<Bytes> {
        let tx = self.to_consensus()?;
        let signed = key.sign_prehash(&tx.signature_hash().0)?;
        let signature = Signature::from_rs_and_parity(
            U256::from_be_bytes(signed.r.0),
            U256::from_be_bytes(signed.s.0),
            u64::from(signed.v),
        )
        .map_err(|e| ShadeError::SignatureError(e.to_string()))?
        .with_chain_id(self.chain_id);

        let mut raw = Vec::with_capacity(tx.encoded_len_with_signature(&signature));
        tx.encode_with_signature_fields(&signature, &mut raw);
        Ok(Bytes::from(raw))
    }
}
