//! Chain configuration records.
//!
//! A [`ChainConfig`] is static for the lifetime of a client. Records are
//! validated when they are built, so everything downstream can rely on an
//! integer chain ID, a parsed contract address and a well-formed endpoint.

use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShadeError};

/// Settlement deployment on one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "serde_json::Value")]
pub struct ChainConfig {
    /// EIP-155 chain ID
    pub chain_id: u64,
    /// Settlement contract address
    pub contract_address: Address,
    /// First block to scan for announcements
    pub start_block: u64,
    /// Announcement indexer endpoint, if one exists for this chain
    pub indexer_endpoint: Option<String>,
    /// Chain's RPC nodes cannot serve `eth_getLogs` over the full range
    pub log_query_unsupported: bool,
}

impl ChainConfig {
    /// Creates a validated chain configuration.
    pub fn new(
        chain_id: u64,
        contract_address: Address,
        start_block: u64,
        indexer_endpoint: Option<String>,
    ) -> Result<Self> {
        if let Some(endpoint) = &indexer_endpoint {
            validate_endpoint(endpoint)?;
        }
        Ok(Self {
            chain_id,
            contract_address,
            start_block,
            indexer_endpoint,
            log_query_unsupported: false,
        })
    }

    /// Marks the chain as unable to serve raw log queries.
    pub fn with_log_query_unsupported(mut self) -> Self {
        self.log_query_unsupported = true;
        self
    }

    /// Parses and validates a JSON record.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json_value(&value)
    }

    /// Validates a caller-supplied JSON record.
    ///
    /// Requires an integer `chainId`, a non-negative integer `startBlock`, a
    /// `contractAddress`, and an `indexerEndpoint` that is either a URL string
    /// or an explicit `null`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ShadeError::Config("chain config must be a JSON object".into()))?;

        let chain_id = match obj.get("chainId") {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ShadeError::Config(format!("chainId must be a non-negative integer, got {n}")))?,
            Some(other) => {
                return Err(ShadeError::Config(format!("chainId must be an integer, got {other}")))
            }
            None => return Err(ShadeError::Config("chainId is required".into())),
        };

        let contract_address = match obj.get("contractAddress") {
            Some(Value::String(s)) => parse_address(s)
                .map_err(|e| ShadeError::Config(format!("contractAddress: {e}")))?,
            _ => return Err(ShadeError::Config("contractAddress must be an address string".into())),
        };

        let start_block = match obj.get("startBlock") {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ShadeError::Config(format!("startBlock must be a non-negative integer, got {n}")))?,
            _ => return Err(ShadeError::Config("startBlock must be a non-negative integer".into())),
        };

        let indexer_endpoint = match obj.get("indexerEndpoint") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) => None,
            _ => {
                return Err(ShadeError::Config(
                    "indexerEndpoint must be a URL string or explicitly null".into(),
                ))
            }
        };

        let log_query_unsupported = match obj.get("logQueryUnsupported") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(ShadeError::Config(format!(
                    "logQueryUnsupported must be a boolean, got {other}"
                )))
            }
        };

        let mut config = Self::new(chain_id, contract_address, start_block, indexer_endpoint)?;
        config.log_query_unsupported = log_query_unsupported;
        Ok(config)
    }
}

impl TryFrom<Value> for ChainConfig {
    type Error = ShadeError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json_value(&value)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| ShadeError::Config(format!("indexerEndpoint '{endpoint}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ShadeError::Config(format!(
            "indexerEndpoint must be http(s), got '{scheme}'"
        ))),
    }
}

/// Parses a `0x`-prefixed 20-byte address in any letter case.
pub fn parse_address(s: &str) -> Result<Address> {
    let trimmed = s.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(ShadeError::InputValidation(format!(
            "'{trimmed}' is not a 0x-prefixed 20-byte address"
        )));
    }
    Address::from_str(trimmed)
        .map_err(|e| ShadeError::InputValidation(format!("invalid address '{trimmed}': {e}")))
}

/// Parses a chain ID supplied as text, rejecting anything but a decimal integer.
pub fn parse_chain_id(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShadeError::InputValidation(format!(
            "chain ID must be an integer, got '{trimmed}'"
        )));
    }
    trimmed
        .parse::<u64>()
        .map_err(|e| ShadeError::InputValidation(format!("chain ID '{trimmed}': {e}")))
}
