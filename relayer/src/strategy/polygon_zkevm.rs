//! Polygon zkEVM relay
//!
//! Validity-proof rollup: there is no challenge window. A bridge deposit on L2
//! becomes claimable on L1 once the batch containing it is verified, which the
//! zkEVM bridge service reports as `ready_for_claim`. The service also
//! provides the Merkle proof for the claim.

use anyhow::Context;
use async_trait::async_trait;
use chain_clients_evm::abi::{self, encode_call, Token};
use chain_clients_evm::{EvmLog, U256};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    client, contract_address, find_event, read, source_receipt, submit, wallet, Layer,
    RelayStrategy,
};
use crate::config::RelayArgs;
use crate::error::RelayError;

/// All fields non-indexed.
pub const BRIDGE_EVENT: &str =
    "BridgeEvent(uint8,uint32,address,uint32,address,uint256,bytes,uint32)";

const BRIDGE: &str = "PolygonZkEVMBridge";

/// Bridge network id of the rollup when the network file does not set one
const DEFAULT_L2_NETWORK_ID: u32 = 1;

/// Leaf type of `bridgeAsset` deposits; everything else is claimed as a message
const LEAF_TYPE_ASSET: u64 = 0;

const MERKLE_TREE_DEPTH: usize = 32;

/// The bridge is deployed at the same address on both layers.
const DEFAULT_CONTRACTS: &[(u64, &str, &str)] = &[
    (1101, BRIDGE, "0x2a3DD3EB832aF982ec71669E178424b10Dca2EDe"),
    (1442, BRIDGE, "0xF6BEEeBB578e214CA9E23B0e9683454Ff88Ed2A7"),
];

const DEFAULT_BRIDGE_SERVICES: &[(u64, &str)] = &[
    (1101, "https://bridge-api.zkevm-rpc.com"),
    (1442, "https://bridge-api.public.zkevm-test.net"),
];

// ============================================================================
// BRIDGE SERVICE API
// ============================================================================

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    deposit: BridgeDeposit,
}

#[derive(Debug, Deserialize)]
struct BridgeDeposit {
    #[serde(default)]
    ready_for_claim: bool,
}

#[derive(Debug, Deserialize)]
struct MerkleProofResponse {
    proof: MerkleProof,
}

/// Claim proof as served by `/merkle-proof`.
#[derive(Debug, Clone, Deserialize)]
pub struct MerkleProof {
    pub merkle_proof: Vec<String>,
    pub main_exit_root: String,
    pub rollup_exit_root: String,
}

/// A deposit as recorded by `BridgeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDepositEvent {
    pub leaf_type: u64,
    pub origin_network: u64,
    pub origin_address: String,
    pub destination_network: u64,
    pub destination_address: String,
    pub amount: U256,
    pub metadata: Vec<u8>,
    pub deposit_count: u64,
}

impl BridgeDepositEvent {
    pub fn from_log(log: &EvmLog) -> anyhow::Result<Self> {
        let data = log.data_bytes()?;
        Ok(Self {
            leaf_type: abi::word_u64(&data, 0)?,
            origin_network: abi::word_u64(&data, 1)?,
            origin_address: abi::word_address(&data, 2)?,
            destination_network: abi::word_u64(&data, 3)?,
            destination_address: abi::word_address(&data, 4)?,
            amount: abi::word_u256(&data, 5)?,
            metadata: abi::dynamic_bytes(&data, 6)?,
            deposit_count: abi::word_u64(&data, 7)?,
        })
    }
}

// ============================================================================
// STRATEGY
// ============================================================================

pub struct PolygonZkEvmRelayStrategy {
    network_id: u64,
    args: RelayArgs,
}

impl PolygonZkEvmRelayStrategy {
    pub fn new(network_id: u64, args: RelayArgs) -> Self {
        Self { network_id, args }
    }

    pub fn boxed(network_id: u64, args: RelayArgs) -> Box<dyn RelayStrategy> {
        Box::new(Self::new(network_id, args))
    }

    fn bridge(&self, layer: Layer) -> Result<String, RelayError> {
        contract_address(
            self.network_id,
            self.args.network_from.as_ref(),
            layer,
            BRIDGE,
            DEFAULT_CONTRACTS,
        )
    }

    fn bridge_service_url(&self) -> Result<String, RelayError> {
        self.args
            .network_from
            .as_ref()
            .and_then(|n| n.bridge_service_url.clone())
            .or_else(|| {
                DEFAULT_BRIDGE_SERVICES
                    .iter()
                    .find(|(id, _)| *id == self.network_id)
                    .map(|(_, url)| url.to_string())
            })
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| RelayError::MissingContract {
                network: self.network_id,
                contract: "bridge service".to_string(),
            })
    }

    fn l2_network_id(&self) -> u32 {
        self.args
            .network_from
            .as_ref()
            .and_then(|n| n.l2_network_id)
            .unwrap_or(DEFAULT_L2_NETWORK_ID)
    }

    async fn ready_for_claim(&self, http: &Client, service: &str, deposit_count: u64) -> Result<bool, RelayError> {
        let url = format!(
            "{}/bridge?net_id={}&deposit_cnt={}",
            service,
            self.l2_network_id(),
            deposit_count
        );
        let response: BridgeResponse = http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to query bridge service {}", url))?
            .error_for_status()
            .with_context(|| format!("Bridge service rejected {}", url))?
            .json()
            .await
            .context("Failed to parse bridge service deposit")?;
        Ok(response.deposit.ready_for_claim)
    }

    async fn merkle_proof(&self, http: &Client, service: &str, deposit_count: u64) -> Result<MerkleProof, RelayError> {
        let url = format!(
            "{}/merkle-proof?deposit_cnt={}&net_id={}",
            service,
            deposit_count,
            self.l2_network_id()
        );
        let response: MerkleProofResponse = http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to query bridge service {}", url))?
            .error_for_status()
            .with_context(|| format!("Bridge service rejected {}", url))?
            .json()
            .await
            .context("Failed to parse bridge service merkle proof")?;

        if response.proof.merkle_proof.len() != MERKLE_TREE_DEPTH {
            return Err(RelayError::Chain(anyhow::anyhow!(
                "merkle proof has {} siblings, expected {}",
                response.proof.merkle_proof.len(),
                MERKLE_TREE_DEPTH
            )));
        }
        Ok(response.proof)
    }
}

#[async_trait]
impl RelayStrategy for PolygonZkEvmRelayStrategy {
    fn name(&self) -> &'static str {
        "polygon-zkevm"
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let l1_bridge = self.bridge(Layer::L1)?;
        let l2_bridge = self.bridge(Layer::L2)?;
        let service = self.bridge_service_url()?;
        let l1 = client(&self.args.l1_rpc_url)?;
        let l2 = client(&self.args.l2_relay_from_rpc_url)?;

        let receipt = source_receipt(&l2, &self.args.l2_transaction_hash).await?;
        let deposit = BridgeDepositEvent::from_log(find_event(&receipt, &l2_bridge, BRIDGE_EVENT)?)?;

        let claimed = read(
            &l1,
            &l1_bridge,
            "isClaimed(uint256)",
            &[Token::uint(deposit.deposit_count)],
        )
        .await?;
        if abi::word_bool(&claimed, 0)? {
            return Err(RelayError::AlreadyExecuted(format!(
                "deposit {} already claimed",
                deposit.deposit_count
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;
        if !self.ready_for_claim(&http, &service, deposit.deposit_count).await? {
            return Err(RelayError::NotReady(format!(
                "deposit {} is not verified on L1 yet",
                deposit.deposit_count
            )));
        }
        let proof = self.merkle_proof(&http, &service, deposit.deposit_count).await?;
        debug!(
            "Claiming deposit {} with exit roots {} / {}",
            deposit.deposit_count, proof.main_exit_root, proof.rollup_exit_root
        );

        let siblings = proof
            .merkle_proof
            .iter()
            .map(|node| Token::bytes32(node))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let function = if deposit.leaf_type == LEAF_TYPE_ASSET {
            "claimAsset"
        } else {
            "claimMessage"
        };
        let calldata = encode_call(
            &format!(
                "{}(bytes32[32],uint32,bytes32,bytes32,uint32,address,uint32,address,uint256,bytes)",
                function
            ),
            &[
                Token::FixedArray(siblings),
                Token::uint(deposit.deposit_count),
                Token::bytes32(&proof.main_exit_root)?,
                Token::bytes32(&proof.rollup_exit_root)?,
                Token::uint(deposit.origin_network),
                Token::address(&deposit.origin_address)?,
                Token::uint(deposit.destination_network),
                Token::address(&deposit.destination_address)?,
                Token::Uint(deposit.amount),
                Token::Bytes(deposit.metadata.clone()),
            ],
        );
        let tx_hash = submit(&l1, &wallet(&self.args)?, &l1_bridge, &calldata, function).await?;
        info!("Claimed deposit {} in {}", deposit.deposit_count, tx_hash);
        Ok(())
    }
}
