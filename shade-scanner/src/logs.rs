//! Raw-log announcement retrieval.
//!
//! Queries the ledger for `Announcement` logs of the settlement contract and
//! enriches each with its transaction sender and block timestamp.

use std::collections::{BTreeSet, HashMap};

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use shade_core::abi;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::LedgerReader;
use shade_core::types::{Announcement, AnnouncementEvent, BlockTag, LogFilter, RawLog};

/// Decodes one `Announcement` log. Returns `None` for logs that do not decode.
pub fn decode_announcement_log(log: &RawLog) -> Option<Announcement> {
    match abi::Announcement::decode_raw_log(log.topics.iter().copied(), &log.data, true) {
        Ok(event) => Some(Announcement {
            receiver: event.receiver,
            amount: event.amount,
            token: event.token,
            pkx: event.pkx,
            ciphertext: event.ciphertext,
        }),
        Err(e) => {
            warn!(tx = %log.transaction_hash, log_index = log.log_index, error = %e, "Skipping undecodable log");
            None
        }
    }
}

/// Fetches and enriches announcement logs in `[from_block, to_block]`.
///
/// Sender and timestamp lookups run with at most `concurrency` requests in
/// flight; each transaction and block is queried once. Returns the events and
/// the number of logs that failed to decode.
#[instrument(skip(ledger))]
pub async fn fetch_log_events(
    ledger: &dyn LedgerReader,
    contract: Address,
    from_block: u64,
    to_block: BlockTag,
    concurrency: usize,
) -> Result<(Vec<AnnouncementEvent>, usize)> {
    let filter = LogFilter {
        address: contract,
        event_signature: abi::Announcement::SIGNATURE_HASH,
        from_block,
        to_block,
    };
    let logs = ledger.get_logs(&filter).await?;
    let total = logs.len();

    let decoded: Vec<(RawLog, Announcement)> = logs
        .into_iter()
        .filter_map(|log| decode_announcement_log(&log).map(|announcement| (log, announcement)))
        .collect();
    let skipped = total - decoded.len();

    let blocks: BTreeSet<u64> = decoded.iter().map(|(log, _)| log.block_number).collect();
    let hashes: BTreeSet<B256> = decoded.iter().map(|(log, _)| log.transaction_hash).collect();
    let concurrency = concurrency.max(1);

    let timestamps: HashMap<u64, u64> = stream::iter(blocks)
        .map(|number| async move { Ok::<_, ShadeError>((number, ledger.block_timestamp(number).await?)) })
        .buffer_unordered(concurrency)
        .try_collect()
        .await?;
    let senders: HashMap<B256, Address> = stream::iter(hashes)
        .map(|hash| async move { Ok::<_, ShadeError>((hash, ledger.transaction_sender(hash).await?)) })
        .buffer_unordered(concurrency)
        .try_collect()
        .await?;

    let mut events = Vec::with_capacity(decoded.len());
    for (log, announcement) in decoded {
        let (Some(&timestamp), Some(&sender)) =
            (timestamps.get(&log.block_number), senders.get(&log.transaction_hash))
        else {
            continue;
        };
        events.push(AnnouncementEvent {
            id: AnnouncementEvent::event_id(&log.transaction_hash, log.log_index),
            announcement,
            sender,
            block_number: log.block_number,
            timestamp,
            tx_hash: log.transaction_hash,
        });
    }

    debug!(events = events.len(), skipped, "Enriched announcement logs");
    Ok((events, skipped))
}
