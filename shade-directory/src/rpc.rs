//! JSON-RPC ledger client.
//!
//! Implements [`LedgerReader`] and [`TransactionSubmitter`] over a node's
//! JSON-RPC endpoint. Account-origin transactions go through
//! `eth_sendTransaction` and are signed by the node. Stealth-origin
//! transactions are signed locally and sent with `eth_sendRawTransaction`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use shade_core::constants::DEFAULT_GAS_LIMIT;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::{LedgerReader, TransactionSubmitter};
use shade_core::types::{LogFilter, RawLog, TransactionRequest, TxHandle, TxOrigin};
use shade_crypto::KeyPair;

use crate::transaction::LegacyTransaction;

/// JSON-RPC client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Node endpoint
    pub rpc_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Chain ID used for locally signed transactions; queried when unset
    pub chain_id: Option<u64>,
}

/// Default node endpoint when none is provided.
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            timeout_seconds: 30,
            chain_id: None,
        }
    }
}

impl RpcConfig {
    /// Creates a configuration for an endpoint.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Pins the chain ID.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}

/// Log object as returned by `eth_getLogs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: String,
    transaction_hash: B256,
    log_index: String,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = ShadeError;

    fn try_from(log: RpcLog) -> Result<Self> {
        Ok(RawLog {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number: parse_quantity_u64(&log.block_number)?,
            transaction_hash: log.transaction_hash,
            log_index: parse_quantity_u64(&log.log_index)?,
        })
    }
}

fn parse_quantity(value: &str) -> Result<U256> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ShadeError::Rpc(format!("expected hex quantity, got '{value}'")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| ShadeError::Rpc(format!("quantity '{value}': {e}")))
}

fn parse_quantity_u64(value: &str) -> Result<u64> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity).map_err(|_| ShadeError::Rpc(format!("quantity '{value}' exceeds u64")))
}

fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ShadeError::Rpc(format!("{what}: expected string, got {value}")))
}

/// Ledger client speaking Ethereum JSON-RPC.
pub struct JsonRpcLedger {
    config: RpcConfig,
    http_client: reqwest::Client,
    request_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcLedger")
            .field("rpc_url", &self.config.rpc_url)
            .finish()
    }
}

impl JsonRpcLedger {
    /// Creates a client for an endpoint with default settings.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_config(RpcConfig::new(rpc_url))
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: RpcConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ShadeError::Http(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            request_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this client talks to.
    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    /// Sends one JSON-RPC request and returns its `result`.
    #[instrument(skip(self, params), fields(url = %self.config.rpc_url))]
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .http_client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShadeError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShadeError::Http(format!("{method}: HTTP {status}")));
        }

        let mut json: Value = response
            .json()
            .await
            .map_err(|e| ShadeError::Http(e.to_string()))?;

        if let Some(error) = json.get("error") {
            warn!(method, error = %error, "JSON-RPC error");
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ShadeError::Rpc(format!("{method}: {message}")));
        }

        debug!(method, "JSON-RPC call succeeded");
        json.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ShadeError::Rpc(format!("{method}: response has no result")))
    }

    async fn chain_id(&self) -> Result<u64> {
        if let Some(chain_id) = self.config.chain_id {
            return Ok(chain_id);
        }
        let result = self.request("eth_chainId", json!([])).await?;
        parse_quantity_u64(as_str(&result, "eth_chainId")?)
    }

    async fn nonce(&self, address: Address) -> Result<u64> {
        let result = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity_u64(as_str(&result, "eth_getTransactionCount")?)
    }

    async fn estimate_gas(&self, from: Address, to: Address, value: U256, data: &Bytes) -> Result<u64> {
        let result = self
            .request(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "value": format!("0x{value:x}"), "data": data }]),
            )
            .await?;
        parse_quantity_u64(as_str(&result, "eth_estimateGas")?)
    }

    async fn send_raw(&self, request: &TransactionRequest, key: &KeyPair) -> Result<B256> {
        let from = request.origin.address();
        let gas_price = match request.gas_price {
            Some(price) => price,
            None => self.gas_price().await?,
        };
        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None if request.data.is_empty() => DEFAULT_GAS_LIMIT,
            None => self.estimate_gas(from, request.to, request.value, &request.data).await?,
        };

        let tx = LegacyTransaction {
            nonce: self.nonce(from).await?,
            gas_price,
            gas_limit,
            to: request.to,
            value: request.value,
            data: request.data.clone(),
            chain_id: self.chain_id().await?,
        };
        let raw = tx.sign(key)?;
        let result = self.request("eth_sendRawTransaction", json!([raw])).await?;
        parse_hash(&result)
    }

    async fn send_from_account(&self, request: &TransactionRequest, from: Address) -> Result<B256> {
        let mut tx = json!({
            "from": from,
            "to": request.to,
            "value": format!("0x{:x}", request.value),
            "data": request.data,
        });
        if let Some(price) = request.gas_price {
            tx["gasPrice"] = json!(format!("0x{price:x}"));
        }
        if let Some(limit) = request.gas_limit {
            tx["gas"] = json!(format!("0x{limit:x}"));
        }
        let result = self.request("eth_sendTransaction", json!([tx])).await?;
        parse_hash(&result)
    }
}

fn parse_hash(value: &Value) -> Result<B256> {
    let s = as_str(value, "transaction hash")?;
    B256::from_str(s).map_err(|e| ShadeError::Rpc(format!("transaction hash '{s}': {e}")))
}

#[async_trait]
impl LedgerReader for JsonRpcLedger {
    async fn balance_of(&self, address: Address) -> Result<U256> {
        let result = self.request("eth_getBalance", json!([address, "latest"])).await?;
        parse_quantity(as_str(&result, "eth_getBalance")?)
    }

    async fn gas_price(&self) -> Result<U256> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(as_str(&result, "eth_gasPrice")?)
    }

    #[instrument(skip(self, filter), fields(from = filter.from_block))]
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let params = json!([{
            "address": filter.address,
            "topics": [filter.event_signature],
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": filter.to_block.to_rpc_param(),
        }]);
        let result = self.request("eth_getLogs", params).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(result)?;
        debug!(count = logs.len(), "Fetched raw logs");
        logs.into_iter().map(RawLog::try_from).collect()
    }

    async fn block_number(&self) -> Result<u64> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(as_str(&result, "eth_blockNumber")?)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let result = self
            .request("eth_getBlockByNumber", json!([format!("0x{number:x}"), false]))
            .await?;
        if result.is_null() {
            return Err(ShadeError::Rpc(format!("block {number} not found")));
        }
        parse_quantity_u64(as_str(&result["timestamp"], "block timestamp")?)
    }

    async fn transaction_sender(&self, hash: B256) -> Result<Address> {
        let result = self.request("eth_getTransactionByHash", json!([hash])).await?;
        if result.is_null() {
            return Err(ShadeError::Rpc(format!("transaction {hash} not found")));
        }
        let from = as_str(&result["from"], "transaction sender")?;
        Address::from_str(from).map_err(|e| ShadeError::Rpc(format!("transaction sender '{from}': {e}")))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let result = self
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        let hex_data = as_str(&result, "eth_call")?;
        Bytes::from_str(hex_data).map_err(|e| ShadeError::Rpc(format!("eth_call result: {e}")))
    }
}

#[async_trait]
impl TransactionSubmitter for JsonRpcLedger {
    #[instrument(skip(self, request), fields(from = %request.origin.address(), to = %request.to))]
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHandle> {
        let hash = match &request.origin {
            TxOrigin::Account(from) => self.send_from_account(&request, *from).await?,
            TxOrigin::Stealth { address, key } => {
                let key = KeyPair::from_private_bytes(key.as_array())?;
                if key.address() != *address {
                    return Err(ShadeError::SignatureError(format!(
                        "key does not control {}",
                        address.to_checksum(None)
                    )));
                }
                self.send_raw(&request, &key).await?
            }
        };
        debug!(%hash, "Submitted transaction");

        Ok(TxHandle {
            hash,
            from: request.origin.address(),
            to: request.to,
            value: request.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_core::types::BlockTag;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_result(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result,
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("0x").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("0x186a0").unwrap(), U256::from(100_000u64));
        assert!(parse_quantity("100").is_err());
        assert!(parse_quantity_u64(&format!("0x{}", "f".repeat(20))).is_err());
    }

    #[tokio::test]
    async fn test_balance_and_gas_price() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_getBalance", json!("0x186a0")).await;
        mock_result(&server, "eth_gasPrice", json!("0xa")).await;

        let ledger = JsonRpcLedger::new(server.uri()).unwrap();
        assert_eq!(
            ledger.balance_of(Address::repeat_byte(1)).await.unwrap(),
            U256::from(100_000u64)
        );
        assert_eq!(ledger.gas_price().await.unwrap(), U256::from(10u64));
    }

    #[tokio::test]
    async fn test_rpc_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32005, "message": "query returned more than 10000 results" },
            })))
            .mount(&server)
            .await;

        let ledger = JsonRpcLedger::new(server.uri()).unwrap();
        let filter = LogFilter {
            address: Address::repeat_byte(0xC0),
            event_signature: B256::ZERO,
            from_block: 0,
            to_block: BlockTag::Latest,
        };
        let err = ledger.get_logs(&filter).await.unwrap_err();
        assert!(matches!(err, ShadeError::Rpc(ref m) if m.contains("10000")));
    }

    #[tokio::test]
    async fn test_get_logs_parses_quantities() {
        let server = MockServer::start().await;
        let hash = B256::repeat_byte(0xAB);
        mock_result(
            &server,
            "eth_getLogs",
            json!([{
                "address": "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0",
                "topics": [B256::ZERO],
                "data": "0x1234",
                "blockNumber": "0x10",
                "transactionHash": hash,
                "logIndex": "0x2",
                "removed": false
            }]),
        )
        .await;

        let ledger = JsonRpcLedger::new(server.uri()).unwrap();
        let filter = LogFilter {
            address: Address::repeat_byte(0xC0),
            event_signature: B256::ZERO,
            from_block: 0,
            to_block: BlockTag::Number(100),
        };
        let logs = ledger.get_logs(&filter).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, 16);
        assert_eq!(logs[0].log_index, 2);
        assert_eq!(logs[0].transaction_hash, hash);
    }

    #[tokio::test]
    async fn test_block_timestamp_and_sender() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_getBlockByNumber", json!({ "number": "0x10", "timestamp": "0x64" })).await;
        mock_result(
            &server,
            "eth_getTransactionByHash",
            json!({ "from": "0x0101010101010101010101010101010101010101" }),
        )
        .await;

        let ledger = JsonRpcLedger::new(server.uri()).unwrap();
        assert_eq!(ledger.block_timestamp(16).await.unwrap(), 100);
        assert_eq!(
            ledger.transaction_sender(B256::ZERO).await.unwrap(),
            Address::repeat_byte(1)
        );
    }

    #[tokio::test]
    async fn test_account_transaction() {
        let server = MockServer::start().await;
        let hash = B256::repeat_byte(0x11);
        mock_result(&server, "eth_sendTransaction", json!(hash)).await;

        let ledger = JsonRpcLedger::new(server.uri()).unwrap();
        let from = Address::repeat_byte(1);
        let request = TransactionRequest::new(TxOrigin::Account(from), Address::repeat_byte(2))
            .value(U256::from(5u64));
        let handle = ledger.send_transaction(request).await.unwrap();
        assert_eq!(handle.hash, hash);
        assert_eq!(handle.from, from);
    }

    #[tokio::test]
    async fn test_stealth_transaction_is_signed_locally() {
        let server = MockServer::start().await;
        let hash = B256::repeat_byte(0x22);
        mock_result(&server, "eth_gasPrice", json!("0x1")).await;
        mock_result(&server, "eth_getTransactionCount", json!("0x0")).await;
        mock_result(&server, "eth_sendRawTransaction", json!(hash)).await;

        let ledger = JsonRpcLedger::with_config(RpcConfig::new(server.uri()).with_chain_id(1)).unwrap();
        let key = KeyPair::generate();
        let origin = TxOrigin::Stealth {
            address: key.address(),
            key: key.secret_bytes().unwrap(),
        };
        let request = TransactionRequest::new(origin, Address::repeat_byte(2)).value(U256::from(1u64));
        assert_eq!(ledger.send_transaction(request).await.unwrap().hash, hash);
    }
}
