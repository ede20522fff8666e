//! # SHADE Stealth Address Protocol
//!
//! High-level API for creating and discovering stealth payments.
//!
//! This crate provides:
//!
//! - **Payment Preparation**: Random number, encrypted payload and denylist-screened stealth address
//! - **Announcement Matching**: Per-announcement test of "is this payment mine"
//! - **Key Derivation**: Spending and viewing keys from a wallet signature
//!
//! ## Quick Start
//!
//! ```rust
//! use shade_crypto::Denylist;
//! use shade_stealth::{match_announcement, prepare_stealth_payment, ShadeKeys};
//! use shade_core::{NATIVE_TOKEN, U256};
//!
//! // Recipient publishes spending + viewing public keys
//! let keys = ShadeKeys::generate();
//! let recipient = keys.recipient_keys().unwrap();
//!
//! // Sender prepares a payment
//! let payment = prepare_stealth_payment(&recipient, &Denylist::default()).unwrap();
//! let announcement = payment.announcement(U256::from(1u64), NATIVE_TOKEN);
//!
//! // Recipient matches the announcement
//! let result = match_announcement(&announcement, &keys.spending.to_public(), &keys.viewing).unwrap();
//! assert!(result.is_for_user);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod discovery;
pub mod payment;
pub mod wallet;

pub use discovery::{match_announcement, MatchResult};
pub use payment::{prepare_stealth_payment, StealthPayment, StealthPaymentBuilder};
pub use wallet::{generate_private_keys, ShadeKeys};
