//! Local message signer.

use alloy::primitives::Address;
use async_trait::async_trait;

use shade_core::constants::SIGNATURE_SIZE;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::MessageSigner;

use crate::hash::eip191_hash;
use crate::keys::KeyPair;

/// Signs personal messages with an in-process private key.
///
/// Nonces follow RFC 6979, so the same message always yields the same
/// signature and key derivation from a signature is reproducible.
#[derive(Clone, Debug)]
pub struct LocalSigner {
    key: KeyPair,
    chain_id: u64,
}

impl LocalSigner {
    /// Creates a signer for a chain.
    ///
    /// # Errors
    /// `InvalidKey` if the key pair holds no private scalar.
    pub fn new(key: KeyPair, chain_id: u64) -> Result<Self> {
        if !key.has_private_key() {
            return Err(ShadeError::InvalidKey("signer requires a private key".into()));
        }
        Ok(Self { key, chain_id })
    }

    /// Creates a signer from a hex private key.
    pub fn from_private_key(hex_str: &str, chain_id: u64) -> Result<Self> {
        Self::new(KeyPair::from_private_key(hex_str)?, chain_id)
    }

    /// The signing key.
    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Signs synchronously.
    pub fn sign_message_sync(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
        Ok(self.key.sign_prehash(&eip191_hash(message))?.to_bytes())
    }
}

#[async_trait]
impl MessageSigner for LocalSigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn sign_message(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
        self.sign_message_sync(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RecoverableSignature;

    #[tokio::test]
    async fn test_signature_recovers_to_signer() {
        let signer = LocalSigner::new(KeyPair::generate(), 1).unwrap();
        let message = b"hello";
        let bytes = signer.sign_message(message).await.unwrap();

        let sig = RecoverableSignature::from_bytes(&bytes).unwrap();
        let recovered = sig.recover_address(&eip191_hash(message)).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[tokio::test]
    async fn test_deterministic() {
        let signer = LocalSigner::from_private_key(&format!("0x{}", "42".repeat(32)), 4).unwrap();
        let a = signer.sign_message(b"same").await.unwrap();
        let b = signer.sign_message(b"same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(signer.chain_id(), 4);
    }

    #[test]
    fn test_requires_private_key() {
        let public = KeyPair::generate().to_public();
        assert!(LocalSigner::new(public, 1).is_err());
    }
}
