//! Relay strategies
//!
//! One implementation per chain family. Every strategy checks whether the
//! message was already executed on the destination before it submits anything,
//! so running it twice for the same transaction sends at most one transaction.

use async_trait::async_trait;
use chain_clients_evm::abi::{encode_call, event_topic};
use chain_clients_evm::{EvmClient, EvmLog, EvmSigner, Token, TransactionReceipt};
use std::time::Duration;
use tracing::info;

use crate::config::{NetworkConfig, RelayArgs};
use crate::error::RelayError;

pub mod arbitrum;
pub mod ethereum;
pub mod optimism;
pub mod polygon_zkevm;

pub use arbitrum::ArbitrumRelayStrategy;
pub use ethereum::EthereumRelayStrategy;
pub use optimism::OptimismRelayStrategy;
pub use polygon_zkevm::PolygonZkEvmRelayStrategy;

/// Delay between receipt polls for relay transactions.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Receipt polls before giving up on a submitted relay transaction.
const RECEIPT_POLL_ATTEMPTS: u32 = 300;

/// Chain-family specific relay procedure.
#[async_trait]
pub trait RelayStrategy: Send + Sync {
    /// Family name used in logs.
    fn name(&self) -> &'static str;

    /// Network the message originates from.
    fn network_id(&self) -> u64;

    /// Family-specific relay; may fail with `AlreadyExecuted`.
    async fn relay(&self) -> Result<(), RelayError>;

    /// Relays the message. A message that was already relayed counts as success.
    async fn run(&self) -> Result<(), RelayError> {
        match self.relay().await {
            Err(RelayError::AlreadyExecuted(reason)) => {
                info!("{} relay on network {}: {}", self.name(), self.network_id(), reason);
                Ok(())
            }
            result => result,
        }
    }
}

/// Builds a strategy for a network id. Must not perform network I/O.
pub type StrategyConstructor = fn(u64, RelayArgs) -> Box<dyn RelayStrategy>;

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Parses the relay wallet key.
pub(crate) fn wallet(args: &RelayArgs) -> Result<EvmSigner, RelayError> {
    EvmSigner::from_private_key_hex(&args.wallet_private_key)
        .map_err(|e| RelayError::InvalidArgument(format!("wallet private key: {}", e)))
}

pub(crate) fn client(rpc_url: &str) -> Result<EvmClient, RelayError> {
    Ok(EvmClient::new(rpc_url)?)
}

/// Receipt of the source transaction; `NotReady` while it is pending.
pub(crate) async fn source_receipt(
    client: &EvmClient,
    tx_hash: &str,
) -> Result<TransactionReceipt, RelayError> {
    let receipt = client
        .get_transaction_receipt(tx_hash)
        .await?
        .ok_or_else(|| RelayError::NotReady(format!("transaction {} is not mined yet", tx_hash)))?;
    if !receipt.is_success() {
        return Err(RelayError::InvalidArgument(format!(
            "transaction {} reverted; there is no message to relay",
            tx_hash
        )));
    }
    Ok(receipt)
}

/// First log in the receipt emitted by `address` for `event_signature`.
pub(crate) fn find_event<'a>(
    receipt: &'a TransactionReceipt,
    address: &str,
    event_signature: &str,
) -> Result<&'a EvmLog, RelayError> {
    let topic = event_topic(event_signature);
    receipt
        .logs
        .iter()
        .find(|log| log.matches(address, &topic))
        .ok_or_else(|| {
            RelayError::InvalidArgument(format!(
                "transaction {} emitted no {} from {}",
                receipt.transaction_hash, event_signature, address
            ))
        })
}

/// Read-only contract call returning raw return data.
pub(crate) async fn read(
    client: &EvmClient,
    to: &str,
    signature: &str,
    args: &[Token],
) -> Result<Vec<u8>, RelayError> {
    Ok(client.call(to, &encode_call(signature, args)).await?)
}

/// Signs, submits and awaits a relay transaction.
pub(crate) async fn submit(
    client: &EvmClient,
    signer: &EvmSigner,
    to: &str,
    calldata: &str,
    label: &str,
) -> Result<String, RelayError> {
    let tx_hash = client.send_transaction(signer, to, calldata).await?;
    info!("Submitted {} transaction {}", label, tx_hash);
    client
        .wait_for_receipt(&tx_hash, RECEIPT_POLL_INTERVAL, Some(RECEIPT_POLL_ATTEMPTS))
        .await?;
    info!("{} transaction {} confirmed", label, tx_hash);
    Ok(tx_hash)
}

/// Which side of the bridge a contract lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layer {
    L1,
    L2,
}

/// Resolves a contract address: custom network file first, then built-in defaults.
pub(crate) fn contract_address(
    network_id: u64,
    network: Option<&NetworkConfig>,
    layer: Layer,
    name: &str,
    defaults: &[(u64, &str, &str)],
) -> Result<String, RelayError> {
    let custom = network.and_then(|n| match layer {
        Layer::L1 => n.l1_contract(name),
        Layer::L2 => n.l2_contract(name),
    });
    custom
        .or_else(|| {
            defaults
                .iter()
                .find(|(id, contract, _)| *id == network_id && *contract == name)
                .map(|(_, _, address)| *address)
        })
        .map(str::to_string)
        .ok_or_else(|| RelayError::MissingContract {
            network: network_id,
            contract: name.to_string(),
        })
}
