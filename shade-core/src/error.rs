//! Error types for SHADE.
//!
//! This module provides the protocol error hierarchy using `thiserror`.
//! Validation errors are raised before any network interaction; infrastructure
//! errors carry the collaborator's message as context.

use alloy::primitives::U256;
use thiserror::Error;

/// Result type alias using `ShadeError`.
pub type Result<T> = std::result::Result<T, ShadeError>;

/// Main error type for all SHADE operations.
#[derive(Debug, Error)]
pub enum ShadeError {
    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed address, key, chain ID or hex encoding.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Invalid or out-of-range key material.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Configuration record failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Payload could not be decrypted into a valid random number.
    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    /// Signature could not be produced or recovered.
    #[error("Signature error: {0}")]
    SignatureError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // PROTOCOL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Balance does not cover the required amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount needed (transfer + toll, or gas cost)
        required: U256,
        /// Balance actually available
        available: U256,
    },

    /// Derived stealth address is on the denylist; regenerate randomness.
    #[error("Unsafe stealth address {0}: regenerate the random number and retry")]
    UnsafeAddress(String),

    /// Recipient keys could not be resolved.
    #[error("Recipient lookup failed for '{recipient}': {reason}")]
    DirectoryLookup {
        /// Recipient identifier as supplied by the caller
        recipient: String,
        /// Why the lookup failed
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Indexer query failed or returned malformed rows.
    #[error("Event retrieval failed: {0}")]
    Retrieval(String),

    /// JSON-RPC call failed or the ledger rejected a transaction.
    #[error("RPC call failed: {0}")]
    Rpc(String),

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    /// ABI decoding failed.
    #[error("ABI decoding failed: {0}")]
    Abi(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShadeError {
    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShadeError::Http(_)
                | ShadeError::Rpc(_)
                | ShadeError::Retrieval(_)
                | ShadeError::UnsafeAddress(_)
        )
    }

    /// Returns true if this is a cryptographic or key-format error.
    ///
    /// The announcement matcher treats exactly this class as "not for us".
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            ShadeError::InvalidKey(_)
                | ShadeError::DecryptionError(_)
                | ShadeError::SignatureError(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ShadeError::InputValidation(_) | ShadeError::InvalidKey(_) | ShadeError::Config(_)
        )
    }
}

impl From<alloy::sol_types::Error> for ShadeError {
    fn from(err: alloy::sol_types::Error) -> Self {
        ShadeError::Abi(err.to_string())
    }
}
