//! EVM JSON-RPC Client
//!
//! Client for communicating with EVM-compatible nodes via JSON-RPC. Covers the
//! reads the bridge needs (receipts, logs, blocks, storage proofs, `eth_call`)
//! and submission of locally-signed legacy transactions.

use anyhow::{Context, Result};
use chain_clients_common::{parse_hex_u64, strip_0x, to_hex_quantity};
use ethereum_types::U256;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::abi::{decode_hex, keccak256, parse_address};
use crate::rlp::LegacyTransaction;
use crate::signer::EvmSigner;

/// Extra gas added on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_MARGIN_PERCENT: u64 = 20;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number (absent for pending logs)
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    /// Transaction hash
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
    /// Log index within the block
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
}

impl EvmLog {
    /// Returns true if this log was emitted by `address` with `topic` as its first topic.
    pub fn matches(&self, address: &str, topic: &str) -> bool {
        chain_clients_common::hex_eq(&self.address, address)
            && self
                .topics
                .first()
                .map(|t| chain_clients_common::hex_eq(t, topic))
                .unwrap_or(false)
    }

    /// Decoded non-indexed data.
    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        decode_hex(&self.data)
    }

    /// Indexed topic as a U256.
    pub fn topic_u256(&self, index: usize) -> Result<U256> {
        let topic = self
            .topics
            .get(index)
            .with_context(|| format!("Log is missing topic {}", index))?;
        Ok(U256::from_big_endian(&decode_hex(topic)?))
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(|n| parse_hex_u64(n).ok())
    }
}

/// Transaction receipt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash", default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// `0x1` on success, `0x0` on revert
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.as_deref().map(|s| parse_hex_u64(s).unwrap_or(0) == 1).unwrap_or(false)
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(|n| parse_hex_u64(n).ok())
    }

    /// Logs emitted by `address` whose first topic is `topic`.
    pub fn logs_matching<'a>(&'a self, address: &'a str, topic: &'a str) -> impl Iterator<Item = &'a EvmLog> {
        self.logs.iter().filter(move |log| log.matches(address, topic))
    }
}

/// Block header fields the bridge uses.
///
/// Arbitrum nodes additionally report `sendCount`/`sendRoot` for their outbox.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockHeader {
    pub number: String,
    pub hash: String,
    #[serde(rename = "stateRoot")]
    pub state_root: String,
    pub timestamp: String,
    #[serde(rename = "sendCount", default)]
    pub send_count: Option<String>,
    #[serde(rename = "sendRoot", default)]
    pub send_root: Option<String>,
}

impl BlockHeader {
    pub fn number_u64(&self) -> Result<u64> {
        Ok(parse_hex_u64(&self.number)?)
    }

    pub fn timestamp_u64(&self) -> Result<u64> {
        Ok(parse_hex_u64(&self.timestamp)?)
    }
}

/// Result of `eth_getProof`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountProof {
    #[serde(rename = "storageHash")]
    pub storage_hash: String,
    #[serde(rename = "storageProof", default)]
    pub storage_proof: Vec<StorageProof>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageProof {
    pub key: String,
    pub value: String,
    pub proof: Vec<String>,
}

/// `eth_getLogs` filter.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Emitting contract
    pub address: String,
    /// Topic filters by position; `None` matches anything
    pub topics: Vec<Option<String>>,
    pub from_block: u64,
    /// `None` means `latest`
    pub to_block: Option<u64>,
}

impl LogFilter {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "address": self.address,
            "topics": self.topics,
            "fromBlock": to_hex_quantity(self.from_block),
            "toBlock": self
                .to_block
                .map(to_hex_quantity)
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for one EVM chain's JSON-RPC endpoint.
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// JSON-RPC endpoint URL
    rpc_url: String,
    /// Monotonic JSON-RPC request id
    next_id: AtomicU64,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - JSON-RPC endpoint (e.g., "http://127.0.0.1:8545")
    ///
    /// # Returns
    ///
    /// * `Ok(EvmClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create the HTTP client
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Generic JSON-RPC call helper.
    ///
    /// A `null` result deserializes into `Option::None` for optional return types.
    pub async fn json_rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response: JsonRpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.rpc_url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, self.rpc_url))?;

        if let Some(error) = response.error {
            anyhow::bail!(
                "JSON-RPC error from {} ({}): {} (code: {})",
                self.rpc_url,
                method,
                error.message,
                error.code
            );
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).with_context(|| format!("Failed to deserialize {} result", method))
    }

    async fn quantity(&self, method: &str, params: Vec<serde_json::Value>) -> Result<u64> {
        let value: String = self.json_rpc(method, params).await?;
        parse_hex_u64(&value).with_context(|| format!("Failed to parse {} result", method))
    }

    /// Chain ID reported by the node (`eth_chainId`).
    pub async fn chain_id(&self) -> Result<u64> {
        self.quantity("eth_chainId", vec![]).await
    }

    /// Current block number.
    pub async fn block_number(&self) -> Result<u64> {
        self.quantity("eth_blockNumber", vec![]).await
    }

    /// Block header by number (`None` = latest).
    pub async fn get_block_by_number(&self, number: Option<u64>) -> Result<Option<BlockHeader>> {
        let tag = number.map(to_hex_quantity).unwrap_or_else(|| "latest".to_string());
        self.json_rpc(
            "eth_getBlockByNumber",
            vec![serde_json::json!(tag), serde_json::json!(false)],
        )
        .await
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Option<BlockHeader>> {
        self.json_rpc(
            "eth_getBlockByHash",
            vec![serde_json::json!(hash), serde_json::json!(false)],
        )
        .await
    }

    /// Receipt for a transaction, `None` while it is pending or unknown.
    pub async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        self.json_rpc("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EvmLog>> {
        debug!("eth_getLogs on {}: {}", self.rpc_url, filter.to_json());
        let logs: Option<Vec<EvmLog>> = self.json_rpc("eth_getLogs", vec![filter.to_json()]).await?;
        Ok(logs.unwrap_or_default())
    }

    /// Read-only contract call against the latest block; returns decoded return data.
    pub async fn call(&self, to: &str, data: &str) -> Result<Vec<u8>> {
        let result: String = self
            .json_rpc(
                "eth_call",
                vec![
                    serde_json::json!({ "to": to, "data": data }),
                    serde_json::json!("latest"),
                ],
            )
            .await?;
        decode_hex(&result)
    }

    pub async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        self.quantity(
            "eth_getTransactionCount",
            vec![serde_json::json!(address), serde_json::json!("pending")],
        )
        .await
    }

    pub async fn gas_price(&self) -> Result<U256> {
        let value: String = self.json_rpc("eth_gasPrice", vec![]).await?;
        U256::from_str_radix(strip_0x(&value), 16).context("Failed to parse gas price")
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &str) -> Result<u64> {
        self.quantity(
            "eth_estimateGas",
            vec![serde_json::json!({ "from": from, "to": to, "data": data })],
        )
        .await
    }

    /// Merkle proof of an account's storage slots at a block (`eth_getProof`).
    pub async fn get_proof(&self, address: &str, slots: &[String], block: u64) -> Result<AccountProof> {
        self.json_rpc(
            "eth_getProof",
            vec![
                serde_json::json!(address),
                serde_json::json!(slots),
                serde_json::json!(to_hex_quantity(block)),
            ],
        )
        .await
    }

    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String> {
        self.json_rpc("eth_sendRawTransaction", vec![serde_json::json!(raw_tx)])
            .await
    }

    /// Signs and broadcasts a legacy (EIP-155) transaction calling `to` with `calldata`.
    ///
    /// Works against public RPCs that do not hold keys. Returns the transaction hash.
    pub async fn send_transaction(&self, signer: &EvmSigner, to: &str, calldata: &str) -> Result<String> {
        let chain_id = self.chain_id().await.context("eth_chainId failed")?;
        let nonce = self
            .get_transaction_count(signer.address())
            .await
            .context("eth_getTransactionCount failed")?;
        let gas_price = self.gas_price().await.context("eth_gasPrice failed")?;
        let estimate = self
            .estimate_gas(signer.address(), to, calldata)
            .await
            .context("eth_estimateGas failed")?;
        let gas_limit = estimate.saturating_add(estimate * GAS_LIMIT_MARGIN_PERCENT / 100);

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: parse_address(to)?,
            value: U256::zero(),
            data: decode_hex(calldata)?,
            chain_id,
        };

        let signing_hash = keccak256(&tx.signing_payload());
        let (r, s, recovery_id) = signer.sign_prehash(&signing_hash)?;
        let raw_tx = format!("0x{}", hex::encode(tx.encode_signed(recovery_id, &r, &s)));

        debug!(
            "EVM raw tx: nonce={}, gas_price={}, gas_limit={}, chain_id={}, from={}",
            nonce,
            gas_price,
            gas_limit,
            chain_id,
            signer.address()
        );

        let tx_hash = self
            .send_raw_transaction(&raw_tx)
            .await
            .context("eth_sendRawTransaction failed")?;
        info!("Submitted transaction {} to {} on chain {}", tx_hash, to, chain_id);
        Ok(tx_hash)
    }

    /// Polls for a receipt until it appears and verifies success.
    ///
    /// # Arguments
    ///
    /// * `tx_hash` - Transaction to wait for
    /// * `interval` - Delay between polls
    /// * `max_attempts` - Upper bound on polls; `None` waits indefinitely
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        interval: Duration,
        max_attempts: Option<u32>,
    ) -> Result<TransactionReceipt> {
        let mut attempts = 0u32;
        loop {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                if receipt.is_success() {
                    return Ok(receipt);
                }
                anyhow::bail!(
                    "EVM transaction {} failed with status: {}",
                    tx_hash,
                    receipt.status.as_deref().unwrap_or("unknown")
                );
            }

            attempts += 1;
            if max_attempts.map(|max| attempts >= max).unwrap_or(false) {
                anyhow::bail!("Timed out waiting for EVM transaction receipt: {}", tx_hash);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
