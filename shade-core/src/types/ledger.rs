//! Ledger request/response types shared by the collaborator traits.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::SecretKeyBytes;

/// Upper bound of a log query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockTag {
    /// A concrete block number
    Number(u64),
    /// The chain head at query time
    Latest,
}

impl BlockTag {
    /// Renders the tag the way JSON-RPC expects it.
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockTag::Number(n) => format!("0x{n:x}"),
            BlockTag::Latest => "latest".to_string(),
        }
    }
}

/// Closed block-range log query against one contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Emitting contract
    pub address: Address,
    /// Topic 0 (event signature hash)
    pub event_signature: B256,
    /// First block (inclusive)
    pub from_block: u64,
    /// Last block (inclusive)
    pub to_block: BlockTag,
}

/// A raw event log as returned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics, signature first
    pub topics: Vec<B256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Block the log was emitted in
    pub block_number: u64,
    /// Enclosing transaction
    pub transaction_hash: B256,
    /// Position of the log in the block
    pub log_index: u64,
}

/// Who pays for and authorizes a transaction.
#[derive(Clone, Debug)]
pub enum TxOrigin {
    /// An account whose key is held by the ledger client (wallet or node)
    Account(Address),
    /// A stealth address; the ledger client signs with the supplied key
    Stealth {
        /// The stealth address
        address: Address,
        /// Its private key
        key: SecretKeyBytes,
    },
}

impl TxOrigin {
    /// Address the transaction is sent from.
    pub fn address(&self) -> Address {
        match self {
            TxOrigin::Account(address) => *address,
            TxOrigin::Stealth { address, .. } => *address,
        }
    }
}

/// A transaction to submit.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    /// Sender and signing authority
    pub origin: TxOrigin,
    /// Destination
    pub to: Address,
    /// Value attached (wei)
    pub value: U256,
    /// Call data
    pub data: Bytes,
    /// Gas price override
    pub gas_price: Option<U256>,
    /// Gas limit override
    pub gas_limit: Option<u64>,
}

impl TransactionRequest {
    /// Creates a request with no value, no data and no gas overrides.
    pub fn new(origin: TxOrigin, to: Address) -> Self {
        Self {
            origin,
            to,
            value: U256::ZERO,
            data: Bytes::new(),
            gas_price: None,
            gas_limit: None,
        }
    }

    /// Attaches value.
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Attaches call data.
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Overrides the gas price.
    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Overrides the gas limit.
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Handle of a submitted (not necessarily confirmed) transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxHandle {
    /// Transaction hash
    pub hash: B256,
    /// Sender
    pub from: Address,
    /// Destination
    pub to: Address,
    /// Value attached
    pub value: U256,
}
