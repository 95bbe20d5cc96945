//! Arbitrum relay
//!
//! L2-to-L1 messages sent through `ArbSys` become executable on the L1
//! `Outbox` once an assertion containing them is confirmed. The outbox
//! announces confirmed send roots with `SendRootUpdated`; the L2 block named
//! there tells how many messages the root covers.

use async_trait::async_trait;
use chain_clients_common::{normalize_evm_address, parse_hex_u64};
use chain_clients_evm::abi::{self, encode_call, event_topic, Token};
use chain_clients_evm::{EvmLog, LogFilter, U256};
use tracing::{debug, info};

use super::{
    client, contract_address, find_event, read, source_receipt, submit, wallet, Layer,
    RelayStrategy,
};
use crate::config::RelayArgs;
use crate::error::RelayError;

/// `ArbSys` precompile
pub const ARB_SYS: &str = "0x0000000000000000000000000000000000000064";

/// `NodeInterface` virtual contract (only reachable through `eth_call`)
pub const NODE_INTERFACE: &str = "0x00000000000000000000000000000000000000c8";

/// Indexed: destination, hash, position
pub const L2_TO_L1_TX_EVENT: &str =
    "L2ToL1Tx(address,address,uint256,uint256,uint256,uint256,uint256,uint256,bytes)";

/// Indexed: outputRoot, l2BlockHash
pub const SEND_ROOT_UPDATED_EVENT: &str = "SendRootUpdated(bytes32,bytes32)";

const OUTBOX: &str = "Outbox";

/// L1 blocks scanned for `SendRootUpdated` unless the network file overrides it.
const DEFAULT_LOG_LOOKBACK_BLOCKS: u64 = 10_000;

const DEFAULT_L1_CONTRACTS: &[(u64, &str, &str)] = &[
    (42161, OUTBOX, "0x0B9857ae2D4A3DBe74ffE1d7DF045bb7F96E4840"),
    (421614, OUTBOX, "0x65f07C7D521164a4d5DaC6eB8Fac8DA067A3B78F"),
];

/// An outgoing message as recorded by `L2ToL1Tx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub caller: String,
    pub destination: String,
    pub position: U256,
    pub arb_block_num: U256,
    pub eth_block_num: U256,
    pub timestamp: U256,
    pub callvalue: U256,
    pub data: Vec<u8>,
}

impl OutgoingMessage {
    pub fn from_log(log: &EvmLog) -> anyhow::Result<Self> {
        let data = log.data_bytes()?;
        let destination = log
            .topics
            .get(1)
            .ok_or_else(|| anyhow::anyhow!("L2ToL1Tx log is missing the destination topic"))?;

        Ok(Self {
            caller: abi::word_address(&data, 0)?,
            destination: normalize_evm_address(destination)?,
            position: log.topic_u256(3)?,
            arb_block_num: abi::word_u256(&data, 1)?,
            eth_block_num: abi::word_u256(&data, 2)?,
            timestamp: abi::word_u256(&data, 3)?,
            callvalue: abi::word_u256(&data, 4)?,
            data: abi::dynamic_bytes(&data, 5)?,
        })
    }
}

pub struct ArbitrumRelayStrategy {
    network_id: u64,
    args: RelayArgs,
}

impl ArbitrumRelayStrategy {
    pub fn new(network_id: u64, args: RelayArgs) -> Self {
        Self { network_id, args }
    }

    pub fn boxed(network_id: u64, args: RelayArgs) -> Box<dyn RelayStrategy> {
        Box::new(Self::new(network_id, args))
    }

    fn outbox(&self) -> Result<String, RelayError> {
        contract_address(
            self.network_id,
            self.args.network_from.as_ref(),
            Layer::L1,
            OUTBOX,
            DEFAULT_L1_CONTRACTS,
        )
    }

    fn log_lookback_blocks(&self) -> u64 {
        self.args
            .network_from
            .as_ref()
            .and_then(|n| n.log_lookback_blocks)
            .unwrap_or(DEFAULT_LOG_LOOKBACK_BLOCKS)
    }
}

#[async_trait]
impl RelayStrategy for ArbitrumRelayStrategy {
    fn name(&self) -> &'static str {
        "arbitrum"
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let outbox = self.outbox()?;
        let l1 = client(&self.args.l1_rpc_url)?;
        let l2 = client(&self.args.l2_relay_from_rpc_url)?;

        let receipt = source_receipt(&l2, &self.args.l2_transaction_hash).await?;
        let message = OutgoingMessage::from_log(find_event(&receipt, ARB_SYS, L2_TO_L1_TX_EVENT)?)?;

        let spent = read(&l1, &outbox, "isSpent(uint256)", &[Token::Uint(message.position)]).await?;
        if abi::word_bool(&spent, 0)? {
            return Err(RelayError::AlreadyExecuted(format!(
                "outbox message {} already executed",
                message.position
            )));
        }

        // Latest confirmed send root on L1
        let latest_l1 = l1.block_number().await?;
        let updates = l1
            .get_logs(&LogFilter {
                address: outbox.clone(),
                topics: vec![Some(event_topic(SEND_ROOT_UPDATED_EVENT))],
                from_block: latest_l1.saturating_sub(self.log_lookback_blocks()),
                to_block: Some(latest_l1),
            })
            .await?;
        let update = updates.last().ok_or_else(|| {
            RelayError::NotReady("no send root confirmed within the lookback window".into())
        })?;
        let l2_block_hash = update
            .topics
            .get(2)
            .ok_or_else(|| RelayError::Chain(anyhow::anyhow!("SendRootUpdated log without block hash")))?;

        let confirmed_block = l2
            .get_block_by_hash(l2_block_hash)
            .await?
            .ok_or_else(|| RelayError::NotReady(format!("L2 block {} not available", l2_block_hash)))?;
        let send_count = confirmed_block
            .send_count
            .as_deref()
            .ok_or_else(|| RelayError::Chain(anyhow::anyhow!("L2 block has no sendCount")))?;
        let send_count = parse_hex_u64(send_count).map_err(|e| RelayError::Chain(e.into()))?;

        if U256::from(send_count) <= message.position {
            return Err(RelayError::NotReady(format!(
                "message {} not confirmed yet (confirmed send count {})",
                message.position, send_count
            )));
        }
        debug!("Send count {} covers message {}", send_count, message.position);

        let proof = read(
            &l2,
            NODE_INTERFACE,
            "constructOutboxProof(uint64,uint64)",
            &[Token::uint(send_count), Token::Uint(message.position)],
        )
        .await?;
        let proof_nodes = abi::dynamic_bytes32_array(&proof, 2)?
            .iter()
            .map(|node| Token::bytes32(node))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let calldata = encode_call(
            "executeTransaction(bytes32[],uint256,address,address,uint256,uint256,uint256,uint256,bytes)",
            &[
                Token::Array(proof_nodes),
                Token::Uint(message.position),
                Token::address(&message.caller)?,
                Token::address(&message.destination)?,
                Token::Uint(message.arb_block_num),
                Token::Uint(message.eth_block_num),
                Token::Uint(message.timestamp),
                Token::Uint(message.callvalue),
                Token::Bytes(message.data.clone()),
            ],
        );
        let tx_hash = submit(&l1, &wallet(&self.args)?, &outbox, &calldata, "outbox execution").await?;
        info!("Executed outbox message {} in {}", message.position, tx_hash);
        Ok(())
    }
}
