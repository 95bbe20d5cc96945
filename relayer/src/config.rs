//! Relayer configuration
//!
//! [`RelayArgs`] carries everything a strategy needs; [`NetworkConfig`] is the
//! optional per-network file overriding built-in contract addresses.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Custom network description, read from a TOML or JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Expected chain id of the L2 RPC endpoint; checked when set
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Contract name -> address on the settlement layer
    #[serde(default)]
    pub l1_contracts: HashMap<String, String>,
    /// Contract name -> address on the L2 itself
    #[serde(default)]
    pub l2_contracts: HashMap<String, String>,
    /// Base URL of an off-chain bridge service (validity-proof rollups)
    #[serde(default)]
    pub bridge_service_url: Option<String>,
    /// Network id the rollup's bridge uses for the L2
    #[serde(default)]
    pub l2_network_id: Option<u32>,
    /// How far back to scan L1 logs for outbox updates
    #[serde(default)]
    pub log_lookback_blocks: Option<u64>,
}

impl NetworkConfig {
    /// Loads a network file; the format follows the file extension.
    ///
    /// # Returns
    ///
    /// * `Ok(NetworkConfig)` - File parsed
    /// * `Err(anyhow::Error)` - File missing, unsupported extension or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read network file {}", path.display()))?;
        let network: NetworkConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse network file {}", path.display()))?;
        debug!("Loaded network file {}: {:?}", path.display(), network);
        Ok(network)
    }

    /// Settlement-layer contract override. Names match case-insensitively
    /// since the config loader lowercases keys.
    pub fn l1_contract(&self, name: &str) -> Option<&str> {
        lookup(&self.l1_contracts, name)
    }

    pub fn l2_contract(&self, name: &str) -> Option<&str> {
        lookup(&self.l2_contracts, name)
    }
}

fn lookup<'a>(contracts: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    contracts
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, address)| address.as_str())
}

/// Inputs of one relay run.
#[derive(Clone)]
pub struct RelayArgs {
    pub l1_rpc_url: String,
    pub l2_relay_from_rpc_url: String,
    pub l2_relay_to_rpc_url: String,
    pub wallet_private_key: String,
    /// Transaction on the relay-from L2 that emitted the message
    pub l2_transaction_hash: String,
    pub network_from: Option<NetworkConfig>,
    pub network_to: Option<NetworkConfig>,
}

impl fmt::Debug for RelayArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayArgs")
            .field("l1_rpc_url", &self.l1_rpc_url)
            .field("l2_relay_from_rpc_url", &self.l2_relay_from_rpc_url)
            .field("l2_relay_to_rpc_url", &self.l2_relay_to_rpc_url)
            .field("wallet_private_key", &"<redacted>")
            .field("l2_transaction_hash", &self.l2_transaction_hash)
            .field("network_from", &self.network_from)
            .field("network_to", &self.network_to)
            .finish()
    }
}
