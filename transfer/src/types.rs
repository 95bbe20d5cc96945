//! Transfer data model
//!
//! Everything here is part of the persisted transfer format. 256-bit values are
//! serialized as decimal strings so no consumer ever parses them as floats.

use chain_clients_common::FormatError;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deployment::DeploymentInfo;
use crate::error::TransferError;

// ============================================================================
// U256 SERIALIZATION
// ============================================================================

/// Serializes `U256` as a decimal string.
pub mod u256_decimal {
    use ethereum_types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_u256(&value).map_err(D::Error::custom)
    }

    /// Same encoding for optional values; `None` is `null`.
    pub mod option {
        use ethereum_types::U256;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|value| super::super::parse_u256(&value).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// Parses a non-negative decimal integer that must fit into 256 bits.
pub fn parse_u256(value: &str) -> Result<U256, FormatError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::new("uint256", value, "expected a decimal integer"));
    }
    U256::from_dec_str(trimmed).map_err(|_| FormatError::new("uint256", value, "does not fit into 256 bits"))
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// One chain taking part in a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Network identifier (EVM chain id)
    pub identifier: u64,
    pub name: String,
    pub rpc_url: String,
    pub request_manager_address: String,
    pub fill_manager_address: String,
    /// First block worth scanning for fill events
    #[serde(default)]
    pub fill_manager_deployment_block: u64,
}

impl ChainDescriptor {
    /// Builds a descriptor from loaded deployment artifacts.
    ///
    /// # Returns
    ///
    /// * `Ok(ChainDescriptor)` - Both `RequestManager` and `FillManager` are deployed on the chain
    /// * `Err(TransferError::InvalidTransfer)` - Chain or one of the contracts is missing
    pub fn from_deployment(
        deployment: &DeploymentInfo,
        identifier: u64,
        name: &str,
        rpc_url: &str,
    ) -> Result<Self, TransferError> {
        let contracts = deployment.get(&identifier).ok_or_else(|| {
            TransferError::InvalidTransfer(format!("no deployment found for chain {}", identifier))
        })?;
        let lookup = |contract: &str| {
            contracts.get(contract).ok_or_else(|| {
                TransferError::InvalidTransfer(format!(
                    "{} is not deployed on chain {}",
                    contract, identifier
                ))
            })
        };
        let request_manager = lookup("RequestManager")?;
        let fill_manager = lookup("FillManager")?;

        Ok(Self {
            identifier,
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            request_manager_address: request_manager.address.clone(),
            fill_manager_address: fill_manager.address.clone(),
            fill_manager_deployment_block: fill_manager.deployment_block,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

// ============================================================================
// METADATA
// ============================================================================

/// Request-side progress. `identifier` is only known once the request is mined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default)]
    pub request_account: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default, with = "u256_decimal::option")]
    pub identifier: Option<U256>,
}

/// Fill observed on the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFillMetadata {
    pub fill_transaction_hash: String,
    pub filler: String,
    pub fill_id: String,
}

// ============================================================================
// STEPS
// ============================================================================

/// Stable step identifiers. The serialized names are part of the persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepId {
    EnsureTokenAllowance,
    SendRequestTransaction,
    WaitForRequestEvent,
    WaitForFulfillment,
}

impl StepId {
    /// Default execution order.
    pub const ALL: [StepId; 4] = [
        StepId::EnsureTokenAllowance,
        StepId::SendRequestTransaction,
        StepId::WaitForRequestEvent,
        StepId::WaitForFulfillment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::EnsureTokenAllowance => "ensureTokenAllowance",
            StepId::SendRequestTransaction => "sendRequestTransaction",
            StepId::WaitForRequestEvent => "waitForRequestEvent",
            StepId::WaitForFulfillment => "waitForFulfillment",
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            StepId::EnsureTokenAllowance => "Ensure token allowance",
            StepId::SendRequestTransaction => "Send request transaction",
            StepId::WaitForRequestEvent => "Wait for request confirmation",
            StepId::WaitForFulfillment => "Wait for fulfillment",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub identifier: StepId,
    pub label: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Step {
    pub fn new(identifier: StepId) -> Self {
        Self {
            identifier,
            label: identifier.default_label().to_string(),
            completed: false,
            error_message: None,
        }
    }
}

/// Progress derived from which metadata fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferPhase {
    /// Nothing submitted yet
    Created,
    /// Request transaction submitted, identifier unknown
    Requested,
    /// Request mined, identifier known
    Confirmed,
    /// Fill observed on the target chain
    Fulfilled,
}

/// User-supplied parameters for a new transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub amount: U256,
    pub source_chain: ChainDescriptor,
    pub target_chain: ChainDescriptor,
    pub source_token: TokenDescriptor,
    pub target_token: TokenDescriptor,
    pub target_account: String,
    pub validity_period: U256,
    pub fees: U256,
}
