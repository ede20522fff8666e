//! # SHADE Client
//!
//! One object per chain that ties the lower crates together: recipient
//! lookup, payment submission, scanning and both withdrawal paths.
//!
//! ```rust,ignore
//! use shade_protocol::{ProtocolConfig, SendOptions, ShadeProtocol};
//!
//! let protocol = ShadeProtocol::builder(ProtocolConfig::new(chain))
//!     .ledger(ledger.clone())
//!     .submitter(ledger)
//!     .directory(directory)
//!     .build()?;
//!
//! let receipt = protocol
//!     .send(sender, "0xRecipient", NATIVE_TOKEN, amount, SendOptions::default())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod protocol;

pub use config::{ProtocolConfig, SendOptions, WithdrawOptions};
pub use protocol::{SendReceipt, ShadeProtocol, ShadeProtocolBuilder};

pub use shade_scanner::{ScanOverrides, ScanReport, ScanStats, SourceKind};
