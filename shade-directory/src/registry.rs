//! Recipient directory backed by the on-chain stealth key registry.
//!
//! The registry stores each registrant's spending and viewing keys in
//! compressed form, as `(prefix, x)` pairs of `uint256` words.

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use shade_core::abi;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::{LedgerReader, RecipientDirectory};
use shade_core::types::{LookupOptions, PublicKeyBytes, RecipientId, RecipientKeys};
use shade_crypto::KeyPair;

use crate::cache::{CacheConfig, KeyCache};

/// Registry directory configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Stealth key registry contract
    pub registry_address: Address,
    /// Whether to cache resolved keys
    pub enable_cache: bool,
    /// Cache TTL in seconds
    pub cache_ttl_seconds: u64,
}

impl DirectoryConfig {
    /// Creates a configuration for a registry contract.
    pub fn new(registry_address: Address) -> Self {
        Self {
            registry_address,
            enable_cache: true,
            cache_ttl_seconds: 600,
        }
    }

    /// Disables caching.
    pub fn no_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }
}

/// Resolves recipients by reading the stealth key registry.
///
/// Addresses are looked up directly. Transaction hashes resolve to their
/// sender first. A raw public key is used as both spending and viewing key.
/// Names are not supported by this directory.
pub struct StealthKeyRegistry {
    ledger: Arc<dyn LedgerReader>,
    config: DirectoryConfig,
    cache: Option<KeyCache>,
}

impl std::fmt::Debug for StealthKeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthKeyRegistry")
            .field("config", &self.config)
            .finish()
    }
}

fn lookup_failed(id: &str, reason: impl std::fmt::Display) -> ShadeError {
    ShadeError::DirectoryLookup {
        recipient: id.to_string(),
        reason: reason.to_string(),
    }
}

fn decompress(prefix: U256, key: U256) -> Result<PublicKeyBytes> {
    let prefix = u8::try_from(prefix)
        .map_err(|_| ShadeError::InvalidKey(format!("registered prefix {prefix} out of range")))?;
    KeyPair::uncompress_from_x(&B256::from(key), prefix)?.to_public_key_bytes()
}

impl StealthKeyRegistry {
    /// Creates a directory reading through `ledger`.
    pub fn new(ledger: Arc<dyn LedgerReader>, config: DirectoryConfig) -> Self {
        let cache = config.enable_cache.then(|| {
            KeyCache::with_config(CacheConfig {
                default_ttl_seconds: config.cache_ttl_seconds,
                ..CacheConfig::default()
            })
        });
        Self { ledger, config, cache }
    }

    /// Reads the keys registered for an address.
    ///
    /// # Errors
    /// `DirectoryLookup` if the address has not registered keys or the
    /// registered values are not valid points.
    #[instrument(skip(self))]
    pub async fn registered_keys(&self, registrant: Address) -> Result<RecipientKeys> {
        if let Some(keys) = self.cache.as_ref().and_then(|cache| cache.get(&registrant)) {
            debug!("Key cache hit");
            return Ok(keys);
        }

        let id = registrant.to_checksum(None);
        let call = abi::stealthKeysCall { registrant };
        let data = self
            .ledger
            .call(self.config.registry_address, call.abi_encode().into())
            .await
            .map_err(|e| lookup_failed(&id, e))?;
        let registered =
            abi::stealthKeysCall::abi_decode_returns(&data, true).map_err(|e| lookup_failed(&id, e))?;

        if registered.spending_key.is_zero() || registered.viewing_key.is_zero() {
            return Err(lookup_failed(&id, "address has not registered stealth keys"));
        }

        let keys = RecipientKeys::new(
            decompress(registered.spending_prefix, registered.spending_key)
                .map_err(|e| lookup_failed(&id, e))?,
            decompress(registered.viewing_prefix, registered.viewing_key)
                .map_err(|e| lookup_failed(&id, e))?,
        );
        if let Some(cache) = &self.cache {
            cache.insert(registrant, keys.clone());
        }
        Ok(keys)
    }
}

#[async_trait]
impl RecipientDirectory for StealthKeyRegistry {
    #[instrument(skip(self))]
    async fn resolve(&self, id: &str, options: LookupOptions) -> Result<RecipientKeys> {
        match RecipientId::classify(id, options)? {
            RecipientId::Address(address) => self.registered_keys(address).await,
            RecipientId::PublicKey(key) => Ok(RecipientKeys::new(key.clone(), key)),
            RecipientId::TxHash(hash) => {
                let sender = self
                    .ledger
                    .transaction_sender(hash)
                    .await
                    .map_err(|e| lookup_failed(id, e))?;
                debug!(%sender, "Resolved transaction sender");
                self.registered_keys(sender).await
            }
            RecipientId::Name(_) => Err(lookup_failed(id, "name resolution is not supported")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::Bytes;
    use alloy::sol_types::SolValue;
    use shade_core::types::{LogFilter, RawLog};

    /// Registry contract double answering `stealthKeys` only.
    #[derive(Default)]
    struct FakeRegistry {
        registered: HashMap<Address, (KeyPair, KeyPair)>,
        senders: HashMap<B256, Address>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerReader for FakeRegistry {
        async fn balance_of(&self, _: Address) -> Result<U256> {
            Err(ShadeError::Internal("unused".into()))
        }
        async fn gas_price(&self) -> Result<U256> {
            Err(ShadeError::Internal("unused".into()))
        }
        async fn get_logs(&self, _: &LogFilter) -> Result<Vec<RawLog>> {
            Err(ShadeError::Internal("unused".into()))
        }
        async fn block_number(&self) -> Result<u64> {
            Err(ShadeError::Internal("unused".into()))
        }
        async fn block_timestamp(&self, _: u64) -> Result<u64> {
            Err(ShadeError::Internal("unused".into()))
        }
        async fn transaction_sender(&self, hash: B256) -> Result<Address> {
            self.senders
                .get(&hash)
                .copied()
                .ok_or_else(|| ShadeError::Rpc("transaction not found".into()))
        }
        async fn call(&self, _: Address, data: Bytes) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let call = abi::stealthKeysCall::abi_decode(&data, true)?;
            let words = match self.registered.get(&call.registrant) {
                Some((spending, viewing)) => {
                    let s = spending.compress_public_key();
                    let v = viewing.compress_public_key();
                    (
                        U256::from(s.prefix),
                        U256::from_be_bytes(s.x.0),
                        U256::from(v.prefix),
                        U256::from_be_bytes(v.x.0),
                    )
                }
                None => (U256::ZERO, U256::ZERO, U256::ZERO, U256::ZERO),
            };
            Ok(Bytes::from(words.abi_encode_params()))
        }
    }

    fn setup() -> (Arc<FakeRegistry>, Address, KeyPair, KeyPair) {
        let spending = KeyPair::generate();
        let viewing = KeyPair::generate();
        let registrant = Address::repeat_byte(0x0A);
        let mut fake = FakeRegistry::default();
        fake.registered
            .insert(registrant, (spending.clone(), viewing.clone()));
        fake.senders.insert(B256::repeat_byte(0x77), registrant);
        (Arc::new(fake), registrant, spending, viewing)
    }

    #[tokio::test]
    async fn test_resolves_registered_keys() {
        let (fake, registrant, spending, viewing) = setup();
        let directory = StealthKeyRegistry::new(fake, DirectoryConfig::new(Address::repeat_byte(0xEE)));

        let keys = directory
            .resolve(&registrant.to_checksum(None), LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(keys.spending_public_key, spending.to_public_key_bytes().unwrap());
        assert_eq!(keys.viewing_public_key, viewing.to_public_key_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_address_fails() {
        let (fake, _, _, _) = setup();
        let directory = StealthKeyRegistry::new(fake, DirectoryConfig::new(Address::repeat_byte(0xEE)));
        let result = directory
            .resolve(&Address::repeat_byte(0x0B).to_string(), LookupOptions::default())
            .await;
        assert!(matches!(result, Err(ShadeError::DirectoryLookup { .. })));
    }

    #[tokio::test]
    async fn test_tx_hash_resolves_through_sender() {
        let (fake, _, spending, _) = setup();
        let directory = StealthKeyRegistry::new(fake, DirectoryConfig::new(Address::repeat_byte(0xEE)));
        let options = LookupOptions {
            support_tx_hash: true,
            ..LookupOptions::default()
        };
        let keys = directory
            .resolve(&B256::repeat_byte(0x77).to_string(), options)
            .await
            .unwrap();
        assert_eq!(keys.spending_public_key, spending.to_public_key_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_names_are_rejected() {
        let (fake, _, _, _) = setup();
        let directory = StealthKeyRegistry::new(fake, DirectoryConfig::new(Address::repeat_byte(0xEE)));
        let result = directory.resolve("alice.eth", LookupOptions::default()).await;
        assert!(matches!(result, Err(ShadeError::DirectoryLookup { .. })));
    }

    #[tokio::test]
    async fn test_cache_avoids_second_call() {
        let (fake, registrant, _, _) = setup();
        let directory = StealthKeyRegistry::new(fake.clone(), DirectoryConfig::new(Address::repeat_byte(0xEE)));
        directory.registered_keys(registrant).await.unwrap();
        directory.registered_keys(registrant).await.unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

        let uncached = StealthKeyRegistry::new(fake.clone(), DirectoryConfig::new(Address::repeat_byte(0xEE)).no_cache());
        uncached.registered_keys(registrant).await.unwrap();
        uncached.registered_keys(registrant).await.unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
    }
}
