//! # SHADE Registry
//!
//! Chain configuration and in-memory collaborators for the SHADE protocol.
//!
//! This crate provides:
//!
//! - **Chains**: Built-in settlement deployments and validated custom records
//! - **Ledger**: An in-memory ledger running the settlement contract
//! - **Directory**: An in-memory recipient directory
//!
//! ## Example
//!
//! ```rust
//! use shade_registry::{ChainRegistry, MemoryLedger};
//!
//! let chains = ChainRegistry::with_defaults();
//! let ledger = MemoryLedger::new(chains.get(11155111).unwrap());
//! assert_eq!(ledger.chain_id(), 11155111);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chains;
mod directory;
mod memory;

pub use chains::{ChainRegistry, DEFAULT_CONTRACT};
pub use directory::MemoryDirectory;
pub use memory::MemoryLedger;
