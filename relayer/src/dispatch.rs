//! Relay strategy registry
//!
//! Maps network identifiers to the chain family whose relay procedure applies.
//! Supporting a new environment of an existing family is a new table row.

use tracing::debug;

use crate::config::RelayArgs;
use crate::error::RelayError;
use crate::strategy::{
    ArbitrumRelayStrategy, EthereumRelayStrategy, OptimismRelayStrategy,
    PolygonZkEvmRelayStrategy, RelayStrategy, StrategyConstructor,
};

/// Chain families with a relay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFamily {
    Ethereum,
    Optimism,
    Arbitrum,
    PolygonZkEvm,
}

impl NetworkFamily {
    pub fn constructor(self) -> StrategyConstructor {
        match self {
            NetworkFamily::Ethereum => EthereumRelayStrategy::boxed,
            NetworkFamily::Optimism => OptimismRelayStrategy::boxed,
            NetworkFamily::Arbitrum => ArbitrumRelayStrategy::boxed,
            NetworkFamily::PolygonZkEvm => PolygonZkEvmRelayStrategy::boxed,
        }
    }
}

/// Network identifier -> family, covering mainnets, public testnets and local devnets.
pub const NETWORKS: &[(u64, NetworkFamily)] = &[
    // Ethereum: mainnet, Goerli, Sepolia, local dev chains
    (1, NetworkFamily::Ethereum),
    (5, NetworkFamily::Ethereum),
    (11155111, NetworkFamily::Ethereum),
    (1337, NetworkFamily::Ethereum),
    (31337, NetworkFamily::Ethereum),
    // OP stack: Optimism mainnet/Goerli/Sepolia, devnet, Base mainnet/Goerli/Sepolia
    (10, NetworkFamily::Optimism),
    (420, NetworkFamily::Optimism),
    (11155420, NetworkFamily::Optimism),
    (901, NetworkFamily::Optimism),
    (8453, NetworkFamily::Optimism),
    (84531, NetworkFamily::Optimism),
    (84532, NetworkFamily::Optimism),
    // Arbitrum: One, Goerli, Sepolia, nitro devnode
    (42161, NetworkFamily::Arbitrum),
    (421613, NetworkFamily::Arbitrum),
    (421614, NetworkFamily::Arbitrum),
    (412346, NetworkFamily::Arbitrum),
    // Polygon zkEVM: mainnet, testnet, local
    (1101, NetworkFamily::PolygonZkEvm),
    (1442, NetworkFamily::PolygonZkEvm),
    (1001, NetworkFamily::PolygonZkEvm),
];

pub fn family_of(network_id: u64) -> Option<NetworkFamily> {
    NETWORKS
        .iter()
        .find(|(id, _)| *id == network_id)
        .map(|(_, family)| *family)
}

/// Builds the strategy responsible for `network_id`.
///
/// # Returns
///
/// * `Ok(Box<dyn RelayStrategy>)` - Strategy for the network's family
/// * `Err(RelayError::UnsupportedNetwork)` - Network is not registered
pub fn create(network_id: u64, args: RelayArgs) -> Result<Box<dyn RelayStrategy>, RelayError> {
    let family = family_of(network_id).ok_or(RelayError::UnsupportedNetwork(network_id))?;
    debug!("Network {} uses the {:?} relay", network_id, family);
    Ok((family.constructor())(network_id, args))
}

/// All registered network identifiers, in table order.
pub fn supported_networks() -> Vec<u64> {
    NETWORKS.iter().map(|(id, _)| *id).collect()
}
