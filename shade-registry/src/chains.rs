//! Chain configuration registry.
//!
//! Ships the settlement deployments SHADE knows about and accepts validated
//! custom records, either programmatically or from JSON.

use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::{address, Address};
use serde_json::Value;
use tracing::{debug, info};

use shade_core::error::{Result, ShadeError};
use shade_core::types::ChainConfig;

/// Settlement contract address shared by the built-in deployments.
pub const DEFAULT_CONTRACT: Address = address!("Fb2dc580Eed955B528407b4d36FfaFe3da685401");

/// Built-in deployments: (chain ID, deployment block).
const BUILT_IN: &[(u64, u64)] = &[
    (1, 12_343_914),
    (10, 4_069_556),
    (100, 28_237_950),
    (137, 20_717_318),
    (8453, 10_761_374),
    (42161, 7_285_883),
    (11155111, 3_590_825),
];

/// Lookup table of chain configurations by chain ID.
#[derive(Clone, Debug, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainConfig>,
}

impl ChainRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in deployments.
    ///
    /// Built-in records carry no indexer endpoint; attach one with
    /// [`ChainRegistry::set_indexer_endpoint`] or register a custom record.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for &(chain_id, start_block) in BUILT_IN {
            registry.chains.insert(
                chain_id,
                ChainConfig {
                    chain_id,
                    contract_address: DEFAULT_CONTRACT,
                    start_block,
                    indexer_endpoint: None,
                    log_query_unsupported: false,
                },
            );
        }
        registry
    }

    /// Adds or replaces a record. Returns the record it replaced.
    pub fn register(&mut self, config: ChainConfig) -> Option<ChainConfig> {
        debug!(chain_id = config.chain_id, "Registering chain config");
        self.chains.insert(config.chain_id, config)
    }

    /// Validates and registers a JSON record.
    pub fn register_json(&mut self, json: &str) -> Result<u64> {
        let config = ChainConfig::from_json_str(json)?;
        let chain_id = config.chain_id;
        self.register(config);
        Ok(chain_id)
    }

    /// Loads a file holding one record or an array of records.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        let records = match value {
            Value::Array(records) => records,
            record @ Value::Object(_) => vec![record],
            _ => {
                return Err(ShadeError::Config(format!(
                    "{} must hold a chain record or an array of records",
                    path.display()
                )))
            }
        };

        let configs = records
            .iter()
            .map(ChainConfig::from_json_value)
            .collect::<Result<Vec<_>>>()?;
        let count = configs.len();
        for config in configs {
            self.register(config);
        }
        info!(count, path = %path.display(), "Loaded chain configs");
        Ok(count)
    }

    /// Sets the indexer endpoint of a registered chain.
    pub fn set_indexer_endpoint(&mut self, chain_id: u64, endpoint: Option<String>) -> Result<()> {
        let current = self.get(chain_id)?.clone();
        let updated = ChainConfig::new(
            current.chain_id,
            current.contract_address,
            current.start_block,
            endpoint,
        )?;
        let updated = if current.log_query_unsupported {
            updated.with_log_query_unsupported()
        } else {
            updated
        };
        self.chains.insert(chain_id, updated);
        Ok(())
    }

    /// Looks up a chain.
    ///
    /// # Errors
    /// `Config` if the chain is not registered.
    pub fn get(&self, chain_id: u64) -> Result<&ChainConfig> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| ShadeError::Config(format!("unsupported chain ID {chain_id}")))
    }

    /// Returns true if the chain is registered.
    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// Registered chain IDs, ascending.
    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.keys().copied().collect()
    }

    /// Iterates over registered records in chain ID order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let registry = ChainRegistry::with_defaults();
        let mainnet = registry.get(1).unwrap();
        assert_eq!(mainnet.contract_address, DEFAULT_CONTRACT);
        assert_eq!(mainnet.start_block, 12_343_914);
        assert!(registry.contains(11155111));
        assert!(matches!(registry.get(999), Err(ShadeError::Config(_))));
    }

    #[test]
    fn test_register_json_validates() {
        let mut registry = ChainRegistry::new();
        let ok = r#"{"chainId": 31337, "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                     "startBlock": 0, "indexerEndpoint": null}"#;
        assert_eq!(registry.register_json(ok).unwrap(), 31337);

        let bad = r#"{"chainId": "31337", "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                      "startBlock": 0, "indexerEndpoint": null}"#;
        assert!(registry.register_json(bad).is_err());
        assert_eq!(registry.chain_ids(), vec![31337]);
    }

    #[test]
    fn test_set_indexer_endpoint() {
        let mut registry = ChainRegistry::with_defaults();
        registry
            .set_indexer_endpoint(137, Some("https://indexer.example/polygon".into()))
            .unwrap();
        assert!(registry.get(137).unwrap().indexer_endpoint.is_some());
        assert!(registry.set_indexer_endpoint(137, Some("ftp://nope".into())).is_err());
        assert!(registry.set_indexer_endpoint(5, None).is_err());
    }

    #[test]
    fn test_load_file_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"chainId": 1, "contractAddress": "0xFb2dc580Eed955B528407b4d36FfaFe3da685401",
                 "startBlock": 1, "indexerEndpoint": "https://indexer.example/mainnet"}},
                {{"chainId": 2, "contractAddress": "0xFb2dc580Eed955B528407b4d36FfaFe3da685401",
                 "startBlock": 2, "indexerEndpoint": null, "logQueryUnsupported": true}}]"#
        )
        .unwrap();

        let mut registry = ChainRegistry::with_defaults();
        assert_eq!(registry.load_file(file.path()).unwrap(), 2);
        assert_eq!(registry.get(1).unwrap().start_block, 1);
        assert!(registry.get(2).unwrap().log_query_unsupported);
    }
}
