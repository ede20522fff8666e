//! Announcement types.
//!
//! Announcements are emitted by the settlement contract for every payment and
//! carry the compressed ephemeral key plus the encrypted random number a
//! recipient needs to discover and later spend the payment.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::NATIVE_TOKEN;
use crate::error::{Result, ShadeError};

/// An on-chain announcement.
///
/// # Wire Format (event data)
/// ```text
/// receiver (topic 1) | token (topic 2) | amount (32) || pkx (32) || ciphertext (32)
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Stealth address the payment was sent to
    pub receiver: Address,
    /// Amount paid (wei or token base units)
    pub amount: U256,
    /// Token address, or the native placeholder
    pub token: Address,
    /// x-coordinate of the ephemeral public key
    pub pkx: B256,
    /// Encrypted random number
    pub ciphertext: B256,
}

impl Announcement {
    /// Returns true if this is a native-asset payment.
    pub fn is_native(&self) -> bool {
        self.token == NATIVE_TOKEN
    }
}

/// An announcement together with where and when it was emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementEvent {
    /// Unique identifier: `<tx hash>-<log index>`
    pub id: String,
    /// The announcement itself
    #[serde(flatten)]
    pub announcement: Announcement,
    /// Sender of the enclosing transaction
    pub sender: Address,
    /// Block the event was emitted in
    pub block_number: u64,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
    /// Enclosing transaction hash
    pub tx_hash: B256,
}

impl AnnouncementEvent {
    /// Builds the identifier used by both retrieval paths.
    pub fn event_id(tx_hash: &B256, log_index: u64) -> String {
        format!("{tx_hash}-{log_index}")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEXER ROWS
// ═══════════════════════════════════════════════════════════════════════════════

/// A row as returned by the announcement indexer. Every field is a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerRow {
    /// Monotonically comparable identifier (pagination cursor)
    pub id: String,
    /// Amount as a decimal string
    pub amount: String,
    /// Block number as a decimal string
    pub block: String,
    /// Ciphertext hex
    pub ciphertext: String,
    /// Transaction sender
    pub from: String,
    /// Ephemeral key x-coordinate hex
    pub pkx: String,
    /// Stealth address
    pub receiver: String,
    /// Block timestamp as a decimal string
    pub timestamp: String,
    /// Token address
    pub token: String,
    /// Transaction hash
    pub tx_hash: String,
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ShadeError::Retrieval(format!("indexer row field '{field}' = '{value}': {e}")))
}

impl TryFrom<IndexerRow> for AnnouncementEvent {
    type Error = ShadeError;

    fn try_from(row: IndexerRow) -> Result<Self> {
        let announcement = Announcement {
            receiver: parse_field("receiver", &row.receiver)?,
            amount: parse_field("amount", &row.amount)?,
            token: parse_field("token", &row.token)?,
            pkx: parse_field("pkx", &row.pkx)?,
            ciphertext: parse_field("ciphertext", &row.ciphertext)?,
        };

        Ok(Self {
            announcement,
            sender: parse_field("from", &row.from)?,
            block_number: parse_field("block", &row.block)?,
            timestamp: parse_field("timestamp", &row.timestamp)?,
            tx_hash: parse_field("txHash", &row.tx_hash)?,
            id: row.id,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// USER ANNOUNCEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// An announcement confirmed to belong to the scanning user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnnouncement {
    /// The matched announcement
    #[serde(flatten)]
    pub announcement: Announcement,
    /// Recovered random number (multiply the spending key by it to spend)
    pub random_number: B256,
    /// Sender of the payment transaction
    pub sender: Address,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
    /// Block number
    pub block_number: u64,
    /// Payment transaction hash
    pub tx_hash: B256,
    /// Whether the funds have already left the stealth address
    pub is_withdrawn: bool,
}

impl UserAnnouncement {
    /// Builds a user announcement from a matched event.
    pub fn from_event(event: &AnnouncementEvent, random_number: B256, is_withdrawn: bool) -> Self {
        Self {
            announcement: event.announcement.clone(),
            random_number,
            sender: event.sender,
            timestamp: event.timestamp,
            block_number: event.block_number,
            tx_hash: event.tx_hash,
            is_withdrawn,
        }
    }

    /// Stealth address holding the funds.
    pub fn receiver(&self) -> Address {
        self.announcement.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> IndexerRow {
        IndexerRow {
            id: "0x01-0".into(),
            amount: "1000000000000000000".into(),
            block: "3590900".into(),
            ciphertext: format!("0x{}", "ab".repeat(32)),
            from: "0x1111111111111111111111111111111111111111".into(),
            pkx: format!("0x{}", "cd".repeat(32)),
            receiver: "0x2222222222222222222222222222222222222222".into(),
            timestamp: "1700000000".into(),
            token: "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".into(),
            tx_hash: format!("0x{}", "01".repeat(32)),
        }
    }

    #[test]
    fn test_indexer_row_parses() {
        let event = AnnouncementEvent::try_from(sample_row()).unwrap();
        assert_eq!(event.block_number, 3_590_900);
        assert_eq!(event.timestamp, 1_700_000_000);
        assert_eq!(event.announcement.amount, U256::from(10u64).pow(U256::from(18u64)));
        assert!(event.announcement.is_native());
        assert_eq!(event.id, "0x01-0");
    }

    #[test]
    fn test_indexer_row_camel_case_json() {
        let json = serde_json::to_value(sample_row()).unwrap();
        assert!(json.get("txHash").is_some());
        let row: IndexerRow = serde_json::from_value(json).unwrap();
        assert_eq!(row, sample_row());
    }

    #[test]
    fn test_indexer_row_bad_field_is_retrieval_error() {
        let mut row = sample_row();
        row.pkx = "0xzz".into();
        let err = AnnouncementEvent::try_from(row).unwrap_err();
        assert!(matches!(err, ShadeError::Retrieval(_)));
        assert!(err.to_string().contains("pkx"));
    }

    #[test]
    fn test_event_id_format() {
        let hash = B256::repeat_byte(0x01);
        let id = AnnouncementEvent::event_id(&hash, 7);
        assert!(id.starts_with("0x0101"));
        assert!(id.ends_with("-7"));
    }

    #[test]
    fn test_user_announcement_flattened_json() {
        let event = AnnouncementEvent::try_from(sample_row()).unwrap();
        let user = UserAnnouncement::from_event(&event, B256::with_last_byte(1), false);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("receiver").is_some());
        assert!(json.get("randomNumber").is_some());
        assert_eq!(json["isWithdrawn"], false);
        assert_eq!(user.receiver(), event.announcement.receiver);
    }
}
