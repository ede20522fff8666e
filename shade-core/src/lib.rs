//! # SHADE Core
//!
//! Core types, errors, and traits for the SHADE stealth payment protocol.
//!
//! This crate provides the foundational building blocks used by all other SHADE crates:
//!
//! - **Types**: Announcements, chain configuration, ledger requests and key material
//! - **Errors**: The protocol error taxonomy
//! - **Constants**: Protocol constants and sizes
//! - **Traits**: Interfaces for the ledger, directory, indexer and signer collaborators
//! - **ABI**: The settlement and key-registry contract surface
//!
//! ## Example
//!
//! ```rust
//! use shade_core::{ChainConfig, ShadeError};
//!
//! let chain = ChainConfig::from_json_str(r#"{
//!     "chainId": 11155111,
//!     "contractAddress": "0xFb2dc580Eed955B528407b4d36FfaFe3da685401",
//!     "startBlock": 3590825,
//!     "indexerEndpoint": null
//! }"#).unwrap();
//! assert_eq!(chain.chain_id, 11155111);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod abi;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{Result, ShadeError};
pub use traits::*;
pub use types::*;

pub use alloy::primitives::{Address, Bytes, B256, U256};
