//! # SHADE Scanner
//!
//! Announcement retrieval and payment discovery.
//!
//! ## Features
//!
//! - **Indexed retrieval**: Paginated GraphQL queries against an indexer
//! - **Raw-log fallback**: `eth_getLogs` over the settlement contract when the
//!   indexer is missing or failing
//! - **Concurrent matching**: Bounded parallelism over retrieved announcements
//! - **Withdrawal status**: Each discovered payment reports whether its funds
//!   have already left the stealth address
//!
//! ## Example
//!
//! ```rust,ignore
//! use shade_scanner::{EventSource, Scanner, ScannerConfig, ScanOverrides};
//!
//! let source = EventSource::new(chain, ledger.clone()).with_indexer(indexer);
//! let scanner = Scanner::new(source, ledger, ScannerConfig::default());
//! let report = scanner.scan(&spending_public, &viewing, ScanOverrides::default()).await?;
//!
//! for payment in report.announcements {
//!     println!("Found {} at {}", payment.announcement.amount, payment.receiver());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod indexer;
mod logs;

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::Bytes;
use alloy::sol_types::SolCall;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use shade_core::abi;
use shade_core::constants::{DEFAULT_SCAN_CONCURRENCY, INDEXER_PAGE_SIZE};
use shade_core::error::{Result, ShadeError};
use shade_core::traits::{IndexerTransport, LedgerReader};
use shade_core::types::{AnnouncementEvent, BlockTag, ChainConfig, UserAnnouncement};
use shade_crypto::KeyPair;
use shade_stealth::match_announcement;

pub use indexer::{fetch_all_rows, GraphQlIndexer, IndexerConfig};
pub use logs::{decode_announcement_log, fetch_log_events};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Announcements matched concurrently
    pub concurrency: usize,
    /// Indexer page size
    pub page_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SCAN_CONCURRENCY,
            page_size: INDEXER_PAGE_SIZE,
        }
    }
}

impl ScannerConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the indexer page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Narrows the scanned block range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOverrides {
    /// First block to scan; defaults to the chain's deployment block
    pub start_block: Option<u64>,
    /// Last block to scan; defaults to the latest block
    pub end_block: Option<u64>,
}

impl ScanOverrides {
    fn contains(&self, chain: &ChainConfig, block: u64) -> bool {
        block >= self.start_block.unwrap_or(chain.start_block)
            && self.end_block.map_or(true, |end| block <= end)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Where announcements came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// Indexer pages
    Indexer,
    /// Raw ledger logs
    Logs,
    /// Nothing was retrieved
    #[default]
    None,
}

/// Events retrieved from one source.
#[derive(Clone, Debug, Default)]
pub struct RetrievedEvents {
    /// Events in the requested range
    pub events: Vec<AnnouncementEvent>,
    /// Rows or logs that could not be parsed
    pub skipped: usize,
    /// Source used
    pub source: SourceKind,
}

/// Retrieves announcements for one chain.
///
/// Prefers the indexer when the chain has an endpoint and a transport is
/// attached. Falls back to raw logs when the indexer is missing or fails,
/// unless the chain cannot serve log queries.
pub struct EventSource {
    chain: ChainConfig,
    ledger: Arc<dyn LedgerReader>,
    indexer: Option<Arc<dyn IndexerTransport>>,
    config: ScannerConfig,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("chain_id", &self.chain.chain_id)
            .field("indexer", &self.indexer.is_some())
            .finish()
    }
}

impl EventSource {
    /// Creates a source reading raw logs from `ledger`.
    pub fn new(chain: ChainConfig, ledger: Arc<dyn LedgerReader>) -> Self {
        Self {
            chain,
            ledger,
            indexer: None,
            config: ScannerConfig::default(),
        }
    }

    /// Attaches an indexer transport.
    pub fn with_indexer(mut self, indexer: Arc<dyn IndexerTransport>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Sets the scanner configuration.
    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Chain this source reads.
    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Fetches from the indexer only.
    pub async fn fetch_indexed(
        &self,
        transport: &dyn IndexerTransport,
        endpoint: &str,
        overrides: ScanOverrides,
    ) -> Result<RetrievedEvents> {
        let rows = fetch_all_rows(transport, endpoint, self.config.page_size).await?;
        let total = rows.len();
        let mut events = Vec::with_capacity(total);
        for row in rows {
            match AnnouncementEvent::try_from(row) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "Skipping malformed indexer row"),
            }
        }
        let skipped = total - events.len();
        events.retain(|event| overrides.contains(&self.chain, event.block_number));

        Ok(RetrievedEvents {
            events,
            skipped,
            source: SourceKind::Indexer,
        })
    }

    /// Fetches from raw ledger logs only.
    pub async fn fetch_logs(&self, overrides: ScanOverrides) -> Result<RetrievedEvents> {
        let from_block = overrides.start_block.unwrap_or(self.chain.start_block);
        let to_block = overrides.end_block.map_or(BlockTag::Latest, BlockTag::Number);
        let (events, skipped) = fetch_log_events(
            self.ledger.as_ref(),
            self.chain.contract_address,
            from_block,
            to_block,
            self.config.concurrency,
        )
        .await?;

        Ok(RetrievedEvents {
            events,
            skipped,
            source: SourceKind::Logs,
        })
    }

    /// Fetches announcements, applying the fallback policy.
    #[instrument(skip(self), fields(chain_id = self.chain.chain_id))]
    pub async fn fetch(&self, overrides: ScanOverrides) -> Result<RetrievedEvents> {
        if let (Some(endpoint), Some(indexer)) = (&self.chain.indexer_endpoint, &self.indexer) {
            match self.fetch_indexed(indexer.as_ref(), endpoint, overrides).await {
                Ok(retrieved) => return Ok(retrieved),
                Err(e) => warn!(error = %e, "Indexer retrieval failed, falling back to logs"),
            }
        }

        if self.chain.log_query_unsupported {
            warn!("Chain cannot serve log queries and no indexer is available; returning no announcements");
            return Ok(RetrievedEvents::default());
        }

        self.fetch_logs(overrides).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Counters for one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Announcements tested
    pub scanned: u64,
    /// Announcements belonging to the user
    pub matched: u64,
    /// Rows or logs that could not be parsed
    pub skipped: u64,
    /// Source the announcements came from
    pub source: SourceKind,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Result of a scan.
#[derive(Clone, Debug, Default)]
pub struct ScanReport {
    /// Payments for the user, ordered by block then identifier
    pub announcements: Vec<UserAnnouncement>,
    /// Counters
    pub stats: ScanStats,
}

/// Discovers a user's payments among retrieved announcements.
pub struct Scanner {
    source: EventSource,
    ledger: Arc<dyn LedgerReader>,
    config: ScannerConfig,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("source", &self.source)
            .field("config", &self.config)
            .finish()
    }
}

/// Whether a payment's funds have already left its stealth address.
///
/// Native payments count as withdrawn once the stealth balance drops below
/// the paid amount. Token payments count as withdrawn once the contract no
/// longer holds a balance for the stealth address.
pub async fn is_withdrawn(
    ledger: &dyn LedgerReader,
    contract: alloy::primitives::Address,
    event: &AnnouncementEvent,
) -> Result<bool> {
    let announcement = &event.announcement;
    if announcement.is_native() {
        let balance = ledger.balance_of(announcement.receiver).await?;
        return Ok(balance < announcement.amount);
    }

    let call = abi::tokenPaymentsCall {
        stealth_address: announcement.receiver,
        token: announcement.token,
    };
    let data = ledger.call(contract, Bytes::from(call.abi_encode())).await?;
    let pending = abi::tokenPaymentsCall::abi_decode_returns(&data, true)?._0;
    Ok(pending.is_zero())
}

impl Scanner {
    /// Creates a scanner.
    pub fn new(source: EventSource, ledger: Arc<dyn LedgerReader>, config: ScannerConfig) -> Self {
        Self { source, ledger, config }
    }

    /// Event source this scanner reads.
    pub fn source(&self) -> &EventSource {
        &self.source
    }

    /// Scans for payments to the holder of `viewing`.
    ///
    /// # Errors
    /// `InvalidKey` if `viewing` has no private scalar. Retrieval errors from
    /// the raw-log path and ledger errors during the withdrawal check are
    /// propagated.
    #[instrument(skip(self, spending_public, viewing))]
    pub async fn scan(
        &self,
        spending_public: &KeyPair,
        viewing: &KeyPair,
        overrides: ScanOverrides,
    ) -> Result<ScanReport> {
        if !viewing.has_private_key() {
            return Err(ShadeError::InvalidKey(
                "viewing private key required to scan announcements".into(),
            ));
        }

        let start = Instant::now();
        let retrieved = self.source.fetch(overrides).await?;
        let scanned = retrieved.events.len() as u64;
        info!(events = scanned, source = ?retrieved.source, "Scanning announcements");

        let ledger = self.ledger.as_ref();
        let contract = self.source.chain.contract_address;
        let mut announcements: Vec<(String, UserAnnouncement)> = stream::iter(retrieved.events)
            .map(|event| async move {
                let result = match_announcement(&event.announcement, spending_public, viewing)?;
                let Some(random_number) = result.random_number else {
                    return Ok::<_, ShadeError>(None);
                };
                let withdrawn = is_withdrawn(ledger, contract, &event).await?;
                debug!(id = %event.id, withdrawn, "Matched announcement");
                Ok(Some((
                    event.id.clone(),
                    UserAnnouncement::from_event(&event, random_number.to_b256(), withdrawn),
                )))
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .try_filter_map(|found| async move { Ok(found) })
            .try_collect()
            .await?;

        announcements.sort_by(|(a_id, a), (b_id, b)| {
            a.block_number.cmp(&b.block_number).then_with(|| a_id.cmp(b_id))
        });

        let stats = ScanStats {
            scanned,
            matched: announcements.len() as u64,
            skipped: retrieved.skipped as u64,
            source: retrieved.source,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            matched = stats.matched,
            scanned = stats.scanned,
            duration_ms = stats.duration_ms,
            "Scan complete"
        );

        Ok(ScanReport {
            announcements: announcements.into_iter().map(|(_, found)| found).collect(),
            stats,
        })
    }
}
