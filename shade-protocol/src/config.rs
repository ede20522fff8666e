//! Orchestrator configuration and per-call options.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use shade_core::constants::{DEFAULT_GAS_LIMIT, MAX_STEALTH_ATTEMPTS};
use shade_core::types::{ChainConfig, LookupOptions};
use shade_scanner::ScannerConfig;

/// Static configuration of a [`crate::ShadeProtocol`] client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Chain and settlement deployment
    pub chain: ChainConfig,
    /// Retrieval and matching settings
    pub scanner: ScannerConfig,
    /// Random numbers drawn before a denylisted recipient is given up on
    pub max_stealth_attempts: usize,
}

impl ProtocolConfig {
    /// Creates a configuration for a chain with default settings.
    pub fn new(chain: ChainConfig) -> Self {
        Self {
            chain,
            scanner: ScannerConfig::default(),
            max_stealth_attempts: MAX_STEALTH_ATTEMPTS,
        }
    }

    /// Sets the scanner configuration.
    pub fn with_scanner(mut self, scanner: ScannerConfig) -> Self {
        self.scanner = scanner;
        self
    }

    /// Sets the stealth attempt limit.
    pub fn with_max_stealth_attempts(mut self, attempts: usize) -> Self {
        self.max_stealth_attempts = attempts.max(1);
        self
    }
}

/// Options for [`crate::ShadeProtocol::send`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    /// Forwarded to the recipient directory
    pub lookup: LookupOptions,
    /// Gas price override
    pub gas_price: Option<U256>,
    /// Gas limit override
    pub gas_limit: Option<u64>,
}

/// Options for [`crate::ShadeProtocol::withdraw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawOptions {
    /// Gas price; read from the ledger when unset
    pub gas_price: Option<U256>,
    /// Gas limit of a native withdrawal
    pub gas_limit: u64,
}

impl Default for WithdrawOptions {
    fn default() -> Self {
        Self {
            gas_price: None,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}
