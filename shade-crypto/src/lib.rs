//! # SHADE Cryptography
//!
//! secp256k1 primitives for the SHADE stealth payment protocol.
//!
//! This crate provides:
//!
//! - **Random numbers**: Per-payment scalars
//! - **Key pairs**: Point/scalar multiplication, compression, addresses, signing
//! - **Encryption**: ECDH + Keccak-256 XOR of the random number, and its wire codec
//! - **Derivation**: Stealth public/private keys and addresses, with denylist screening
//! - **Meta-withdrawals**: Digest construction and signing for relayed withdrawals
//! - **Signer**: A local RFC 6979 personal-message signer
//!
//! ## Security Properties
//!
//! - Private scalars are zeroized on drop and redacted in `Debug`
//! - Signatures use deterministic RFC 6979 nonces
//! - Stealth address comparison is constant-time
//!
//! ## Example
//!
//! ```rust
//! use shade_crypto::{derive_stealth_address, KeyPair, RandomNumber};
//!
//! let spending = KeyPair::generate();
//! let viewing = KeyPair::generate();
//!
//! // Sender
//! let r = RandomNumber::generate();
//! let stealth = derive_stealth_address(&spending.to_public(), &r).unwrap();
//! let payload = viewing.to_public().encrypt(&r).unwrap();
//!
//! // Recipient
//! let recovered = viewing.decrypt(&payload).unwrap();
//! let stealth_key = spending.mul_private_key(&recovered).unwrap();
//! assert_eq!(stealth_key.address(), stealth);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod denylist;
pub mod derive;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod meta;
pub mod random;
pub mod signer;

// Re-export main items at crate root
pub use denylist::Denylist;
pub use derive::{
    derive_checked_stealth_key, derive_stealth_address, derive_stealth_private_key,
    derive_stealth_public_key, verify_stealth_address,
};
pub use encryption::EncryptedPayload;
pub use hash::{eip191_hash, keccak256};
pub use keys::{public_key_to_address, CompressedPublicKey, KeyPair, RecoverableSignature};
pub use meta::{
    parse_hook_data, recover_withdraw_signer, sign_withdraw, RawWithdrawAuthorization,
    WithdrawAuthorization,
};
pub use random::RandomNumber;
pub use signer::LocalSigner;
