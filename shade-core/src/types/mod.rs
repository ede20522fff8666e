//! Domain types for SHADE.
//!
//! This module provides the data structures shared across the protocol:
//!
//! - [`RecipientKeys`]: Published spending/viewing public keys of a recipient
//! - [`SecretKeyBytes`]: Zeroized private scalar bytes
//! - [`Announcement`]: On-chain payment record
//! - [`UserAnnouncement`]: A matched announcement with its recovered random number
//! - [`ChainConfig`]: Validated per-chain settings
//! - [`TransactionRequest`]: Ledger submission request
//! - [`RecipientId`]: Classified recipient identifier

mod keys;
mod announcement;
mod chain;
mod ledger;
mod recipient;

pub use keys::*;
pub use announcement::*;
pub use chain::*;
pub use ledger::*;
pub use recipient::*;
