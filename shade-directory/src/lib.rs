//! # SHADE Directory
//!
//! Network-facing collaborators for the SHADE protocol.
//!
//! - **JSON-RPC ledger**: balances, logs, contract reads and transaction
//!   submission against an Ethereum node
//! - **Stealth key registry**: recipient lookup from on-chain registered keys
//! - **Key cache**: TTL cache in front of registry reads
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shade_directory::{DirectoryConfig, JsonRpcLedger, StealthKeyRegistry};
//!
//! let ledger = Arc::new(JsonRpcLedger::new("https://rpc.example")?);
//! let directory = StealthKeyRegistry::new(ledger, DirectoryConfig::new(registry_address));
//! let keys = directory.resolve("0x…", LookupOptions::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod registry;
mod rpc;
mod transaction;

pub use cache::{CacheConfig, KeyCache};
pub use registry::{DirectoryConfig, StealthKeyRegistry};
pub use rpc::{JsonRpcLedger, RpcConfig};
pub use transaction::LegacyTransaction;
