//! Indexed announcement retrieval.
//!
//! Rows are fetched from a GraphQL indexer in pages ordered by identifier.
//! Each page asks for rows strictly after the greatest identifier seen so
//! far; retrieval ends at the first empty page.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use shade_core::constants::INDEXER_ENTITY_KEY;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::IndexerTransport;
use shade_core::types::IndexerRow;

/// Indexer client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

fn page_query() -> String {
    format!(
        "query announcements($cursor: String!, $first: Int!) {{ \
         {INDEXER_ENTITY_KEY}(first: $first, orderBy: id, orderDirection: asc, where: {{ id_gt: $cursor }}) \
         {{ amount block ciphertext from id pkx receiver timestamp token txHash }} }}"
    )
}

/// GraphQL indexer client.
pub struct GraphQlIndexer {
    http_client: reqwest::Client,
}

impl std::fmt::Debug for GraphQlIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlIndexer").finish()
    }
}

impl GraphQlIndexer {
    /// Creates a client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(IndexerConfig::default())
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: IndexerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ShadeError::Http(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl IndexerTransport for GraphQlIndexer {
    #[instrument(skip(self))]
    async fn fetch_page(&self, endpoint: &str, cursor: &str, first: usize) -> Result<Vec<IndexerRow>> {
        let body = json!({
            "query": page_query(),
            "variables": { "cursor": cursor, "first": first },
        });

        let response = self
            .http_client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShadeError::Retrieval(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShadeError::Retrieval(format!("indexer returned HTTP {status}")));
        }

        let mut json: Value = response
            .json()
            .await
            .map_err(|e| ShadeError::Retrieval(e.to_string()))?;

        if let Some(errors) = json.get("errors") {
            return Err(ShadeError::Retrieval(format!("indexer query failed: {errors}")));
        }

        let rows = json
            .get_mut("data")
            .and_then(|data| data.get_mut(INDEXER_ENTITY_KEY))
            .map(Value::take)
            .ok_or_else(|| {
                ShadeError::Retrieval(format!("indexer response has no '{INDEXER_ENTITY_KEY}'"))
            })?;

        serde_json::from_value(rows).map_err(|e| ShadeError::Retrieval(format!("malformed indexer row: {e}")))
    }
}

/// Fetches every row from an indexer.
///
/// Returns the union of all pages with duplicate identifiers dropped, in the
/// order rows were first seen. A non-empty page that does not move the
/// cursor forward is a `Retrieval` error.
#[instrument(skip(transport))]
pub async fn fetch_all_rows(
    transport: &dyn IndexerTransport,
    endpoint: &str,
    page_size: usize,
) -> Result<Vec<IndexerRow>> {
    if page_size == 0 {
        return Err(ShadeError::Config("indexer page size must be positive".into()));
    }

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = String::new();
    let mut pages = 0usize;

    loop {
        let page = transport.fetch_page(endpoint, &cursor, page_size).await?;
        pages += 1;
        if page.is_empty() {
            break;
        }
        debug!(page = pages, rows = page.len(), "Fetched indexer page");

        let mut advanced = false;
        for row in page {
            if row.id > cursor {
                cursor = row.id.clone();
                advanced = true;
            }
            if seen.insert(row.id.clone()) {
                rows.push(row);
            }
        }
        if !advanced {
            warn!(%cursor, "Indexer page did not advance the cursor");
            return Err(ShadeError::Retrieval(format!(
                "indexer page {pages} did not advance past cursor '{cursor}'"
            )));
        }
    }

    info!(rows = rows.len(), pages, "Fetched indexed announcements");
    Ok(rows)
}
