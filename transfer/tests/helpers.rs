//! Shared test helpers for transfer tests
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy addresses, hashes and keys
//! - **Builders**: Functions to create test transfers
//! - **Recording gateway**: In-memory `ContractGateway` that records every call

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_transfer::{
    ChainDescriptor, ContractGateway, FulfillmentFilter, RequestFillMetadata,
    RequestTransaction, TokenDescriptor, TransferParams,
};
use chain_clients_evm::{EvmSigner, U256};
use std::sync::Mutex;

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- USERS ---------------------------------

/// Well-known first Hardhat/Anvil development key (never holds real funds)
pub const DUMMY_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address derived from `DUMMY_PRIVATE_KEY`
pub const DUMMY_SIGNER_ADDR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Dummy receiving account on the target chain (EVM format, 20 bytes)
pub const DUMMY_TARGET_ACCOUNT: &str = "0x0000000000000000000000000000000000000009";

/// Dummy filler (liquidity provider) address
pub const DUMMY_FILLER_ADDR: &str = "0x000000000000000000000000000000000000000f";

// ------------------------- TOKENS AND CONTRACTS -------------------------

pub const DUMMY_REQUEST_MANAGER_ADDR: &str = "0x0000000000000000000000000000000000000010";
pub const DUMMY_FILL_MANAGER_ADDR: &str = "0x0000000000000000000000000000000000000011";
pub const DUMMY_SOURCE_TOKEN_ADDR: &str = "0x0000000000000000000000000000000000000020";
pub const DUMMY_TARGET_TOKEN_ADDR: &str = "0x0000000000000000000000000000000000000021";

// -------------------------------- OTHER ---------------------------------

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000012";

/// Dummy fill id (64 hex characters)
pub const DUMMY_FILL_ID: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000f1";

pub const TEST_SOURCE_CHAIN_ID: u64 = 1;
pub const TEST_TARGET_CHAIN_ID: u64 = 2;

// ============================================================================
// BUILDERS
// ============================================================================

pub fn test_signer() -> EvmSigner {
    EvmSigner::from_private_key_hex(DUMMY_PRIVATE_KEY).unwrap()
}

pub fn build_chain(identifier: u64, rpc_url: &str) -> ChainDescriptor {
    ChainDescriptor {
        identifier,
        name: format!("chain-{}", identifier),
        rpc_url: rpc_url.to_string(),
        request_manager_address: DUMMY_REQUEST_MANAGER_ADDR.to_string(),
        fill_manager_address: DUMMY_FILL_MANAGER_ADDR.to_string(),
        fill_manager_deployment_block: 0,
    }
}

fn build_token(address: &str) -> TokenDescriptor {
    TokenDescriptor {
        address: address.to_string(),
        symbol: "TST".to_string(),
        decimals: 18,
    }
}

/// Transfer parameters: amount 1, chain 1 -> 2, validity period 3, fees 4.
pub fn build_test_params() -> TransferParams {
    TransferParams {
        amount: U256::from(1u64),
        source_chain: build_chain(TEST_SOURCE_CHAIN_ID, "http://127.0.0.1:8545"),
        target_chain: build_chain(TEST_TARGET_CHAIN_ID, "http://127.0.0.1:8546"),
        source_token: build_token(DUMMY_SOURCE_TOKEN_ADDR),
        target_token: build_token(DUMMY_TARGET_TOKEN_ADDR),
        target_account: DUMMY_TARGET_ACCOUNT.to_string(),
        validity_period: U256::from(3u64),
        fees: U256::from(4u64),
    }
}

// ============================================================================
// RECORDING GATEWAY
// ============================================================================

/// A gateway call as seen by the recording gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    EnsureTokenAllowance {
        rpc_url: String,
        owner: String,
        token: String,
        spender: String,
        required: U256,
    },
    SendRequestTransaction {
        rpc_url: String,
        request: RequestTransaction,
    },
    GetRequestIdentifier {
        rpc_url: String,
        request_manager: String,
        transaction_hash: String,
    },
    WaitForFulfillment {
        rpc_url: String,
        fill_manager: String,
        filter: FulfillmentFilter,
    },
}

impl GatewayCall {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayCall::EnsureTokenAllowance { .. } => "ensure_token_allowance",
            GatewayCall::SendRequestTransaction { .. } => "send_request_transaction",
            GatewayCall::GetRequestIdentifier { .. } => "get_request_identifier",
            GatewayCall::WaitForFulfillment { .. } => "wait_for_fulfillment",
        }
    }
}

/// In-memory gateway returning canned results and recording every call.
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    /// Hash returned by `send_request_transaction`
    pub tx_hash: String,
    /// Identifier returned by `get_request_identifier`
    pub identifier: U256,
    /// Name of a call that should fail instead
    fail_on: Mutex<Option<&'static str>>,
}

impl RecordingGateway {
    pub fn new(tx_hash: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            tx_hash: tx_hash.to_string(),
            identifier: U256::from(1u64),
            fail_on: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, call: Option<&'static str>) {
        *self.fail_on.lock().unwrap() = call;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(GatewayCall::name).collect()
    }

    fn record(&self, call: GatewayCall) -> anyhow::Result<()> {
        let name = call.name();
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(name) {
            anyhow::bail!("connection reset while calling {}", name);
        }
        Ok(())
    }
}

#[async_trait]
impl ContractGateway for RecordingGateway {
    async fn ensure_token_allowance(
        &self,
        rpc_url: &str,
        _signer: &EvmSigner,
        owner: &str,
        token: &str,
        spender: &str,
        required: U256,
    ) -> anyhow::Result<Option<String>> {
        self.record(GatewayCall::EnsureTokenAllowance {
            rpc_url: rpc_url.to_string(),
            owner: owner.to_string(),
            token: token.to_string(),
            spender: spender.to_string(),
            required,
        })?;
        Ok(None)
    }

    async fn send_request_transaction(
        &self,
        rpc_url: &str,
        _signer: &EvmSigner,
        request: &RequestTransaction,
    ) -> anyhow::Result<String> {
        self.record(GatewayCall::SendRequestTransaction {
            rpc_url: rpc_url.to_string(),
            request: request.clone(),
        })?;
        Ok(self.tx_hash.clone())
    }

    async fn get_request_identifier(
        &self,
        rpc_url: &str,
        request_manager: &str,
        transaction_hash: &str,
    ) -> anyhow::Result<U256> {
        self.record(GatewayCall::GetRequestIdentifier {
            rpc_url: rpc_url.to_string(),
            request_manager: request_manager.to_string(),
            transaction_hash: transaction_hash.to_string(),
        })?;
        Ok(self.identifier)
    }

    async fn wait_for_fulfillment(
        &self,
        rpc_url: &str,
        fill_manager: &str,
        filter: &FulfillmentFilter,
    ) -> anyhow::Result<RequestFillMetadata> {
        self.record(GatewayCall::WaitForFulfillment {
            rpc_url: rpc_url.to_string(),
            fill_manager: fill_manager.to_string(),
            filter: filter.clone(),
        })?;
        Ok(RequestFillMetadata {
            fill_transaction_hash: DUMMY_TX_HASH.to_string(),
            filler: DUMMY_FILLER_ADDR.to_string(),
            fill_id: DUMMY_FILL_ID.to_string(),
        })
    }
}
