//! Request-manager / fill-manager gateway
//!
//! Typed contract operations used by the transfer steps. [`ContractGateway`] is
//! the seam between the state machine and the chain; [`EvmContractGateway`] is
//! the JSON-RPC implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chain_clients_common::normalize_evm_address;
use chain_clients_evm::abi::{self, Token};
use chain_clients_evm::{EvmClient, EvmLog, EvmSigner, LogFilter, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::types::RequestFillMetadata;

// ============================================================================
// CONTRACT SIGNATURES
// ============================================================================

const ALLOWANCE_SIGNATURE: &str = "allowance(address,address)";
const APPROVE_SIGNATURE: &str = "approve(address,uint256)";

/// `createRequest(targetChainId, sourceToken, targetToken, targetAccount, amount, validityPeriod)`
const CREATE_REQUEST_SIGNATURE: &str = "createRequest(uint256,address,address,address,uint256,uint256)";

/// Emitted by the request manager; topic 1 carries the request identifier.
pub const REQUEST_CREATED_EVENT: &str =
    "RequestCreated(uint96,uint256,address,address,address,address,uint256,uint256,uint256)";

/// Emitted by the fill manager. Indexed: requestId, sourceChainId, targetTokenAddress.
/// Data: fillId, filler, amount.
pub const REQUEST_FILLED_EVENT: &str = "RequestFilled(uint96,bytes32,uint256,address,address,uint256)";

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Arguments of the request-manager `createRequest` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTransaction {
    pub amount: U256,
    pub target_chain_id: u64,
    pub request_manager: String,
    pub source_token: String,
    pub target_token: String,
    pub target_account: String,
    pub validity_period: U256,
    /// Collected by the request manager through the token allowance
    pub fees: U256,
}

/// Which fill to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentFilter {
    pub identifier: U256,
    pub source_chain_id: u64,
    /// First block to scan on the target chain
    pub from_block: u64,
}

/// Contract operations the transfer steps depend on.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Approves `required` for `spender` unless the current allowance already covers it.
    ///
    /// Returns the approval transaction hash, or `None` if nothing was sent.
    async fn ensure_token_allowance(
        &self,
        rpc_url: &str,
        signer: &EvmSigner,
        owner: &str,
        token: &str,
        spender: &str,
        required: U256,
    ) -> Result<Option<String>>;

    /// Submits `createRequest` and returns the transaction hash (not waiting for inclusion).
    async fn send_request_transaction(
        &self,
        rpc_url: &str,
        signer: &EvmSigner,
        request: &RequestTransaction,
    ) -> Result<String>;

    /// Waits for the request transaction and reads the identifier from its `RequestCreated` log.
    async fn get_request_identifier(
        &self,
        rpc_url: &str,
        request_manager: &str,
        transaction_hash: &str,
    ) -> Result<U256>;

    /// Blocks until the fill manager reports a fill for the filtered request.
    async fn wait_for_fulfillment(
        &self,
        rpc_url: &str,
        fill_manager: &str,
        filter: &FulfillmentFilter,
    ) -> Result<RequestFillMetadata>;
}

// ============================================================================
// EVM IMPLEMENTATION
// ============================================================================

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_log_block_range() -> u64 {
    10_000
}

/// Polling behaviour of [`EvmContractGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Delay between receipt/log polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for each wait; `None` waits until the event is observed
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,
    /// Maximum number of blocks per `eth_getLogs` query; providers reject wide ranges
    #[serde(default = "default_log_block_range")]
    pub log_block_range: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_ms: None,
            log_block_range: default_log_block_range(),
        }
    }
}

impl GatewayConfig {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Number of receipt polls that fit into the timeout.
    fn max_attempts(&self) -> Option<u32> {
        self.wait_timeout_ms.map(|timeout| {
            let attempts = timeout / self.poll_interval_ms.max(1);
            u32::try_from(attempts.max(1)).unwrap_or(u32::MAX)
        })
    }

    fn deadline(&self) -> Option<Instant> {
        self.wait_timeout_ms
            .map(|timeout| Instant::now() + Duration::from_millis(timeout))
    }
}

/// [`ContractGateway`] over EVM JSON-RPC. Opens a fresh client per call.
#[derive(Debug, Clone, Default)]
pub struct EvmContractGateway {
    config: GatewayConfig,
}

impl EvmContractGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Extracts fill metadata from a `RequestFilled` log.
fn parse_fill_log(log: &EvmLog) -> Result<RequestFillMetadata> {
    let data = log.data_bytes()?;
    Ok(RequestFillMetadata {
        fill_transaction_hash: log
            .transaction_hash
            .clone()
            .context("RequestFilled log has no transaction hash")?,
        fill_id: abi::word_bytes32(&data, 0)?,
        filler: abi::word_address(&data, 1)?,
    })
}

#[async_trait]
impl ContractGateway for EvmContractGateway {
    async fn ensure_token_allowance(
        &self,
        rpc_url: &str,
        signer: &EvmSigner,
        owner: &str,
        token: &str,
        spender: &str,
        required: U256,
    ) -> Result<Option<String>> {
        let client = EvmClient::new(rpc_url)?;

        let calldata = abi::encode_call(
            ALLOWANCE_SIGNATURE,
            &[Token::address(owner)?, Token::address(spender)?],
        );
        let result = client
            .call(token, &calldata)
            .await
            .context("Failed to query token allowance")?;
        let allowance = abi::word_u256(&result, 0)?;

        if allowance >= required {
            debug!(
                "Allowance {} of {} for {} already covers {}",
                allowance, token, spender, required
            );
            return Ok(None);
        }

        let calldata = abi::encode_call(
            APPROVE_SIGNATURE,
            &[Token::address(spender)?, Token::Uint(required)],
        );
        let tx_hash = client
            .send_transaction(signer, token, &calldata)
            .await
            .context("Failed to submit token approval")?;
        client
            .wait_for_receipt(&tx_hash, self.config.poll_interval(), self.config.max_attempts())
            .await?;

        info!("Approved {} of {} for {} ({})", required, token, spender, tx_hash);
        Ok(Some(tx_hash))
    }

    async fn send_request_transaction(
        &self,
        rpc_url: &str,
        signer: &EvmSigner,
        request: &RequestTransaction,
    ) -> Result<String> {
        let client = EvmClient::new(rpc_url)?;

        let calldata = abi::encode_call(
            CREATE_REQUEST_SIGNATURE,
            &[
                Token::uint(request.target_chain_id),
                Token::address(&request.source_token)?,
                Token::address(&request.target_token)?,
                Token::address(&request.target_account)?,
                Token::Uint(request.amount),
                Token::Uint(request.validity_period),
            ],
        );

        let tx_hash = client
            .send_transaction(signer, &request.request_manager, &calldata)
            .await
            .context("Failed to submit request transaction")?;

        info!(
            "Sent request: amount={}, fees={}, target_chain={}, tx={}",
            request.amount, request.fees, request.target_chain_id, tx_hash
        );
        Ok(tx_hash)
    }

    async fn get_request_identifier(
        &self,
        rpc_url: &str,
        request_manager: &str,
        transaction_hash: &str,
    ) -> Result<U256> {
        let client = EvmClient::new(rpc_url)?;
        let receipt = client
            .wait_for_receipt(
                transaction_hash,
                self.config.poll_interval(),
                self.config.max_attempts(),
            )
            .await?;

        let topic = abi::event_topic(REQUEST_CREATED_EVENT);
        let log = receipt
            .logs_matching(request_manager, &topic)
            .next()
            .with_context(|| {
                format!(
                    "No RequestCreated event from {} in transaction {}",
                    request_manager, transaction_hash
                )
            })?;

        let identifier = log.topic_u256(1)?;
        info!("Request {} confirmed with identifier {}", transaction_hash, identifier);
        Ok(identifier)
    }

    async fn wait_for_fulfillment(
        &self,
        rpc_url: &str,
        fill_manager: &str,
        filter: &FulfillmentFilter,
    ) -> Result<RequestFillMetadata> {
        let client = EvmClient::new(rpc_url)?;
        let fill_manager = normalize_evm_address(fill_manager)?;
        let deadline = self.config.deadline();

        let topics = vec![
            Some(abi::event_topic(REQUEST_FILLED_EVENT)),
            Some(abi::u256_topic(filter.identifier)),
            Some(abi::u256_topic(U256::from(filter.source_chain_id))),
        ];
        let mut from_block = filter.from_block;
        let range = self.config.log_block_range.max(1);

        loop {
            let latest = client.block_number().await?;
            while from_block <= latest {
                let to_block = from_block.saturating_add(range - 1).min(latest);
                let logs = client
                    .get_logs(&LogFilter {
                        address: fill_manager.clone(),
                        topics: topics.clone(),
                        from_block,
                        to_block: Some(to_block),
                    })
                    .await
                    .context("Failed to query RequestFilled events")?;

                if let Some(log) = logs.first() {
                    let fill = parse_fill_log(log)?;
                    info!(
                        "Request {} filled by {} in {}",
                        filter.identifier, fill.filler, fill.fill_transaction_hash
                    );
                    return Ok(fill);
                }
                from_block = to_block + 1;
            }

            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                anyhow::bail!(
                    "Timed out waiting for fulfillment of request {} on {}",
                    filter.identifier,
                    fill_manager
                );
            }
            debug!("Request {} not filled yet (scanned to block {})", filter.identifier, latest);
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}
