//! Collaborator interfaces for SHADE.
//!
//! The protocol core never talks to a node, an indexer or a wallet directly.
//! It goes through these traits so the same flows run against a JSON-RPC
//! endpoint, an in-memory ledger, or a test double.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    IndexerRow, LogFilter, LookupOptions, RawLog, RecipientKeys, TransactionRequest, TxHandle,
};

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the ledger.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Native balance of an address.
    async fn balance_of(&self, address: Address) -> Result<U256>;

    /// Current gas price.
    async fn gas_price(&self) -> Result<U256>;

    /// Logs matching a filter, in ledger order.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>>;

    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Timestamp of a block (Unix seconds).
    async fn block_timestamp(&self, number: u64) -> Result<u64>;

    /// Sender of a transaction.
    async fn transaction_sender(&self, hash: B256) -> Result<Address>;

    /// Read-only contract call. Returns the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// Submits transactions. Does not wait for confirmation.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Sends a transaction and returns its handle.
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHandle>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves a recipient identifier to published public keys.
///
/// Identifiers may be an address, a name, a raw public key or a transaction
/// hash, depending on what the implementation and [`LookupOptions`] allow.
/// Failures are reported as `ShadeError::DirectoryLookup`.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Looks up the spending and viewing keys of a recipient.
    async fn resolve(&self, recipient: &str, options: LookupOptions) -> Result<RecipientKeys>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEXER
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetches one page of announcement rows from an indexer.
#[async_trait]
pub trait IndexerTransport: Send + Sync {
    /// Returns up to `first` rows with identifiers strictly greater than
    /// `cursor`, in ascending identifier order.
    async fn fetch_page(&self, endpoint: &str, cursor: &str, first: usize) -> Result<Vec<IndexerRow>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Signs personal messages on behalf of a user account.
///
/// Key derivation from a signature is only reproducible when the signer
/// produces deterministic (RFC 6979) signatures.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Address;

    /// Chain the signer is connected to.
    fn chain_id(&self) -> u64;

    /// Signs an EIP-191 personal message. Returns `r || s || v`.
    async fn sign_message(&self, message: &[u8]) -> Result<[u8; 65]>;
}
