//! In-memory recipient directory.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use shade_core::error::{Result, ShadeError};
use shade_core::traits::{LedgerReader, RecipientDirectory};
use shade_core::types::{LookupOptions, RecipientId, RecipientKeys};

/// Directory backed by concurrent maps.
///
/// Addresses and names are registered explicitly. Transaction hashes resolve
/// to their sender through the attached ledger, then to that sender's keys.
/// A raw public key resolves to itself as both spending and viewing key.
#[derive(Default)]
pub struct MemoryDirectory {
    by_address: DashMap<Address, RecipientKeys>,
    by_name: DashMap<String, RecipientKeys>,
    ledger: Option<Arc<dyn LedgerReader>>,
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory")
            .field("addresses", &self.by_address.len())
            .field("names", &self.by_name.len())
            .field("ledger", &self.ledger.is_some())
            .finish()
    }
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a ledger for transaction-hash lookups.
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerReader>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Publishes keys for an address.
    pub fn register(&self, address: Address, keys: RecipientKeys) {
        self.by_address.insert(address, keys);
    }

    /// Publishes keys under a name. Names are case-insensitive.
    pub fn register_name(&self, name: &str, keys: RecipientKeys) {
        self.by_name.insert(name.to_lowercase(), keys);
    }

    /// Number of registered addresses and names.
    pub fn len(&self) -> usize {
        self.by_address.len() + self.by_name.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_address(&self, id: &str, address: &Address) -> Result<RecipientKeys> {
        self.by_address
            .get(address)
            .map(|keys| keys.clone())
            .ok_or_else(|| not_found(id, "no keys published for this address"))
    }
}

fn not_found(id: &str, reason: &str) -> ShadeError {
    ShadeError::DirectoryLookup {
        recipient: id.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    #[instrument(skip(self))]
    async fn resolve(&self, id: &str, options: LookupOptions) -> Result<RecipientKeys> {
        let keys = match RecipientId::classify(id, options)? {
            RecipientId::Address(address) => self.lookup_address(id, &address)?,
            RecipientId::Name(name) => self
                .by_name
                .get(&name.to_lowercase())
                .map(|keys| keys.clone())
                .ok_or_else(|| not_found(id, "name is not registered"))?,
            RecipientId::PublicKey(key) => RecipientKeys::new(key.clone(), key),
            RecipientId::TxHash(hash) => {
                let ledger = self
                    .ledger
                    .as_ref()
                    .ok_or_else(|| not_found(id, "no ledger attached for transaction lookups"))?;
                let sender = ledger.transaction_sender(hash).await.map_err(|e| {
                    ShadeError::DirectoryLookup {
                        recipient: id.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                self.lookup_address(id, &sender)?
            }
        };
        debug!("Resolved recipient keys");
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use shade_core::types::{PublicKeyBytes, TransactionRequest, TxOrigin};
    use shade_core::traits::TransactionSubmitter;
    use shade_core::ChainConfig;

    use crate::MemoryLedger;

    fn keys(fill: u8) -> RecipientKeys {
        let mut bytes = vec![fill; 65];
        bytes[0] = 0x04;
        let key = PublicKeyBytes::from_bytes(&bytes).unwrap();
        RecipientKeys::new(key.clone(), key)
    }

    #[tokio::test]
    async fn test_resolve_address_and_name() {
        let directory = MemoryDirectory::new();
        let address = Address::repeat_byte(0x01);
        directory.register(address, keys(1));
        directory.register_name("Alice.eth", keys(2));

        let resolved = directory
            .resolve(&address.to_checksum(None), LookupOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved, keys(1));

        let resolved = directory.resolve("alice.eth", LookupOptions::default()).await.unwrap();
        assert_eq!(resolved, keys(2));
    }

    #[tokio::test]
    async fn test_unknown_recipient() {
        let directory = MemoryDirectory::new();
        let result = directory
            .resolve(&Address::repeat_byte(0x09).to_string(), LookupOptions::default())
            .await;
        assert!(matches!(result, Err(ShadeError::DirectoryLookup { .. })));
    }

    #[tokio::test]
    async fn test_public_key_identifier() {
        let directory = MemoryDirectory::new();
        let expected = keys(3);
        let id = expected.spending_public_key.to_hex();
        let options = LookupOptions {
            support_pub_key: true,
            ..LookupOptions::default()
        };
        assert_eq!(directory.resolve(&id, options).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_tx_hash_resolves_sender() {
        let chain = ChainConfig::new(1337, Address::repeat_byte(0xC0), 0, None).unwrap();
        let ledger = Arc::new(MemoryLedger::new(&chain));
        let sender = Address::repeat_byte(0x01);
        ledger.fund(sender, U256::from(10u64));
        let handle = ledger
            .send_transaction(TransactionRequest::new(TxOrigin::Account(sender), Address::repeat_byte(0x02)))
            .await
            .unwrap();

        let directory = MemoryDirectory::new().with_ledger(ledger);
        directory.register(sender, keys(4));
        let options = LookupOptions {
            support_tx_hash: true,
            ..LookupOptions::default()
        };
        let resolved = directory.resolve(&handle.hash.to_string(), options).await.unwrap();
        assert_eq!(resolved, keys(4));
    }
}
