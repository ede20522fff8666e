//! Keccak-256 hashing.
//!
//! Every digest in the protocol is Keccak-256: addresses, the symmetric key
//! derived from the ECDH shared secret, the meta-withdrawal digest, and the
//! spending/viewing keys derived from a signature.
//!
//! ```text
//! symmetric_key  = keccak256(x(d · E))
//! address        = keccak256(P[1..65])[12..32]
//! personal_hash  = keccak256("\x19Ethereum Signed Message:\n" || len || msg)
//! ```

use sha3::{Digest, Keccak256};

// ═══════════════════════════════════════════════════════════════════════════════
// KECCAK256
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes Keccak256 hash.
///
/// Note: Keccak256 is NOT SHA3-256. They use different padding.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    Digest::update(&mut hasher, input);
    hasher.finalize().into()
}

/// Computes Keccak256 over several inputs, concatenated in order.
pub fn keccak256_concat(inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for input in inputs {
        Digest::update(&mut hasher, input);
    }
    hasher.finalize().into()
}

// ═══════════════════════════════════════════════════════════════════════════════
// EIP-191 PERSONAL MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Hashes a message the way wallets do for `personal_sign`.
///
/// The message length is rendered in decimal, so a 32-byte digest is
/// prefixed with `"\x19Ethereum Signed Message:\n32"`.
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let len = message.len().to_string();
    keccak256_concat(&[PERSONAL_MESSAGE_PREFIX, len.as_bytes(), message])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256() {
        let hash = keccak256(b"hello");
        let expected =
            hex::decode("1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8").unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(b"");
        let expected =
            hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470").unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        assert_eq!(keccak256_concat(&[b"hel", b"lo"]), keccak256(b"hello"));
    }

    #[test]
    fn test_eip191_matches_alloy() {
        let digest = [0xabu8; 32];
        let ours = eip191_hash(&digest);
        let theirs = alloy::primitives::eip191_hash_message(digest);
        assert_eq!(ours, theirs.0);

        let text = b"Sign this message";
        assert_eq!(eip191_hash(text), alloy::primitives::eip191_hash_message(text).0);
    }
}
