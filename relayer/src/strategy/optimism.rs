//! OP-stack relay
//!
//! Withdrawals from an OP-stack L2 go through two L1 transactions on the
//! `OptimismPortal`:
//!
//! 1. `proveWithdrawalTransaction` once an L2 output covering the withdrawal
//!    block has been proposed to the `L2OutputOracle`
//! 2. `finalizeWithdrawalTransaction` after `FINALIZATION_PERIOD_SECONDS`
//!    have passed since the proof
//!
//! Each run performs at most one of them and reports `NotReady` in between.

use async_trait::async_trait;
use chain_clients_common::normalize_evm_address;
use chain_clients_evm::abi::{self, encode_call, keccak256, Token};
use chain_clients_evm::{EvmClient, EvmLog, U256};
use tracing::{debug, info};

use super::{
    client, contract_address, find_event, read, source_receipt, submit, wallet, Layer,
    RelayStrategy,
};
use crate::config::RelayArgs;
use crate::error::RelayError;

/// `L2ToL1MessagePasser` predeploy
pub const L2_TO_L1_MESSAGE_PASSER: &str = "0x4200000000000000000000000000000000000016";

pub const MESSAGE_PASSED_EVENT: &str =
    "MessagePassed(uint256,address,address,uint256,uint256,bytes,bytes32)";

const OPTIMISM_PORTAL: &str = "OptimismPortal";
const L2_OUTPUT_ORACLE: &str = "L2OutputOracle";

const WITHDRAWAL_TUPLE: &str = "(uint256,address,address,uint256,uint256,bytes)";

/// Known L1 deployments: (L2 chain id, contract, address)
const DEFAULT_L1_CONTRACTS: &[(u64, &str, &str)] = &[
    (10, OPTIMISM_PORTAL, "0xbEb5Fc579115071764c7423A4f12eDde41f106Ed"),
    (10, L2_OUTPUT_ORACLE, "0xdfe97868233d1aa22e815a266982f2cf17685a27"),
    (11155420, OPTIMISM_PORTAL, "0x16Fc5058F25648194471939df75CF27A2fdC48BC"),
    (11155420, L2_OUTPUT_ORACLE, "0x90E9c4f8a994a250F6aEfd61CAFb4F2e895D458F"),
    (8453, OPTIMISM_PORTAL, "0x49048044D57e1C92A77f79988d21Fa8fAF74E97e"),
    (8453, L2_OUTPUT_ORACLE, "0x56315b90c40730925ec5485cf004d835058518A0"),
    (84532, OPTIMISM_PORTAL, "0x49f53e41452C74589E85cA1677426Ba426459e85"),
    (84532, L2_OUTPUT_ORACLE, "0x84457ca9D0163FbC4bbfe4Dfbb20ba46e48DF254"),
];

/// A withdrawal as recorded by the `MessagePassed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub nonce: U256,
    pub sender: String,
    pub target: String,
    pub value: U256,
    pub gas_limit: U256,
    pub data: Vec<u8>,
    pub withdrawal_hash: String,
}

impl Withdrawal {
    /// Decodes the event. Indexed: nonce, sender, target.
    pub fn from_log(log: &EvmLog) -> anyhow::Result<Self> {
        let data = log.data_bytes()?;

        Ok(Self {
            nonce: log.topic_u256(1)?,
            sender: topic_address(log, 2)?,
            target: topic_address(log, 3)?,
            value: abi::word_u256(&data, 0)?,
            gas_limit: abi::word_u256(&data, 1)?,
            data: abi::dynamic_bytes(&data, 2)?,
            withdrawal_hash: abi::word_bytes32(&data, 3)?,
        })
    }

    fn to_token(&self) -> anyhow::Result<Token> {
        Ok(Token::Tuple(vec![
            Token::Uint(self.nonce),
            Token::address(&self.sender)?,
            Token::address(&self.target)?,
            Token::Uint(self.value),
            Token::Uint(self.gas_limit),
            Token::Bytes(self.data.clone()),
        ]))
    }

    /// Storage slot of this withdrawal in the message passer's `sentMessages` mapping.
    pub fn storage_slot(&self) -> anyhow::Result<String> {
        let mut preimage = abi::decode_hex(&self.withdrawal_hash)?;
        preimage.extend_from_slice(&[0u8; 32]);
        Ok(format!("0x{}", hex::encode(keccak256(&preimage))))
    }
}

fn topic_address(log: &EvmLog, index: usize) -> anyhow::Result<String> {
    let topic = log
        .topics
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("MessagePassed log is missing topic {}", index))?;
    Ok(normalize_evm_address(topic)?)
}

pub struct OptimismRelayStrategy {
    network_id: u64,
    args: RelayArgs,
}

impl OptimismRelayStrategy {
    pub fn new(network_id: u64, args: RelayArgs) -> Self {
        Self { network_id, args }
    }

    pub fn boxed(network_id: u64, args: RelayArgs) -> Box<dyn RelayStrategy> {
        Box::new(Self::new(network_id, args))
    }

    fn l1_contract(&self, name: &str) -> Result<String, RelayError> {
        contract_address(
            self.network_id,
            self.args.network_from.as_ref(),
            Layer::L1,
            name,
            DEFAULT_L1_CONTRACTS,
        )
    }

    fn message_passer(&self) -> String {
        self.args
            .network_from
            .as_ref()
            .and_then(|n| n.l2_contract("L2ToL1MessagePasser"))
            .unwrap_or(L2_TO_L1_MESSAGE_PASSER)
            .to_string()
    }

    /// Submits the withdrawal proof against the first L2 output covering `l2_block`.
    async fn prove(
        &self,
        l1: &EvmClient,
        l2: &EvmClient,
        portal: &str,
        oracle: &str,
        withdrawal: &Withdrawal,
        l2_block: u64,
    ) -> Result<(), RelayError> {
        let latest_output_block = abi::word_u64(&read(l1, oracle, "latestBlockNumber()", &[]).await?, 0)?;
        if latest_output_block < l2_block {
            return Err(RelayError::NotReady(format!(
                "latest L2 output covers block {}, withdrawal is in block {}",
                latest_output_block, l2_block
            )));
        }

        let output_index = abi::word_u256(
            &read(
                l1,
                oracle,
                "getL2OutputIndexAfter(uint256)",
                &[Token::uint(l2_block)],
            )
            .await?,
            0,
        )?;
        let output = read(l1, oracle, "getL2Output(uint256)", &[Token::Uint(output_index)]).await?;
        let output_block = abi::word_u64(&output, 2)?;
        debug!("Proving against L2 output {} at block {}", output_index, output_block);

        let header = l2
            .get_block_by_number(Some(output_block))
            .await?
            .ok_or_else(|| RelayError::NotReady(format!("L2 block {} not available", output_block)))?;
        let account_proof = l2
            .get_proof(&self.message_passer(), &[withdrawal.storage_slot()?], output_block)
            .await?;
        let storage_proof = account_proof.storage_proof.first().ok_or_else(|| {
            RelayError::Chain(anyhow::anyhow!("eth_getProof returned no storage proof"))
        })?;

        let output_root_proof = Token::Tuple(vec![
            Token::FixedBytes(vec![0u8; 32]),
            Token::bytes32(&header.state_root)?,
            Token::bytes32(&account_proof.storage_hash)?,
            Token::bytes32(&header.hash)?,
        ]);
        let proof_nodes = storage_proof
            .proof
            .iter()
            .map(|node| Token::bytes_hex(node))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let calldata = encode_call(
            &format!(
                "proveWithdrawalTransaction({},uint256,(bytes32,bytes32,bytes32,bytes32),bytes[])",
                WITHDRAWAL_TUPLE
            ),
            &[
                withdrawal.to_token()?,
                Token::Uint(output_index),
                output_root_proof,
                Token::Array(proof_nodes),
            ],
        );
        submit(l1, &wallet(&self.args)?, portal, &calldata, "prove withdrawal").await?;

        Err(RelayError::NotReady(format!(
            "withdrawal {} proven; finalization period started",
            withdrawal.withdrawal_hash
        )))
    }

    async fn finalize(
        &self,
        l1: &EvmClient,
        portal: &str,
        oracle: &str,
        withdrawal: &Withdrawal,
        proven_at: u64,
    ) -> Result<(), RelayError> {
        let period = abi::word_u64(
            &read(l1, oracle, "FINALIZATION_PERIOD_SECONDS()", &[]).await?,
            0,
        )?;
        let now = l1
            .get_block_by_number(None)
            .await?
            .ok_or_else(|| RelayError::Chain(anyhow::anyhow!("L1 returned no latest block")))?
            .timestamp_u64()?;

        let ready_at = proven_at.saturating_add(period);
        if now < ready_at {
            return Err(RelayError::NotReady(format!(
                "withdrawal {} can be finalized in {}s",
                withdrawal.withdrawal_hash,
                ready_at - now
            )));
        }

        let calldata = encode_call(
            &format!("finalizeWithdrawalTransaction({})", WITHDRAWAL_TUPLE),
            &[withdrawal.to_token()?],
        );
        submit(l1, &wallet(&self.args)?, portal, &calldata, "finalize withdrawal").await?;
        Ok(())
    }
}

#[async_trait]
impl RelayStrategy for OptimismRelayStrategy {
    fn name(&self) -> &'static str {
        "optimism"
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let portal = self.l1_contract(OPTIMISM_PORTAL)?;
        let oracle = self.l1_contract(L2_OUTPUT_ORACLE)?;
        let l1 = client(&self.args.l1_rpc_url)?;
        let l2 = client(&self.args.l2_relay_from_rpc_url)?;

        let receipt = source_receipt(&l2, &self.args.l2_transaction_hash).await?;
        let l2_block = receipt
            .block_number_u64()
            .ok_or_else(|| RelayError::NotReady("source receipt has no block number".into()))?;
        let log = find_event(&receipt, &self.message_passer(), MESSAGE_PASSED_EVENT)?;
        let withdrawal = Withdrawal::from_log(log)?;
        let hash = Token::bytes32(&withdrawal.withdrawal_hash)?;

        let finalized = read(&l1, &portal, "finalizedWithdrawals(bytes32)", &[hash.clone()]).await?;
        if abi::word_bool(&finalized, 0)? {
            return Err(RelayError::AlreadyExecuted(format!(
                "withdrawal {} already finalized",
                withdrawal.withdrawal_hash
            )));
        }

        let proven = read(&l1, &portal, "provenWithdrawals(bytes32)", &[hash]).await?;
        let proven_at = abi::word_u64(&proven, 1)?;
        if proven_at == 0 {
            info!("Withdrawal {} not proven yet", withdrawal.withdrawal_hash);
            self.prove(&l1, &l2, &portal, &oracle, &withdrawal, l2_block).await
        } else {
            info!("Withdrawal {} proven at {}", withdrawal.withdrawal_hash, proven_at);
            self.finalize(&l1, &portal, &oracle, &withdrawal, proven_at).await
        }
    }
}
