//! Relayer program
//!
//! One relay invocation end to end: validate arguments, load custom network
//! files, resolve chain ids, pick the strategy and run it once.

use chain_clients_common::{ensure_0x, validate_hex_bytes, validate_tx_hash};
use chain_clients_evm::EvmClient;
use clap::Parser;
use std::fmt;
use std::future::Future;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{NetworkConfig, RelayArgs};
use crate::dispatch;
use crate::error::RelayError;
use crate::strategy::RelayStrategy;

/// `EvmClient` speaks JSON-RPC over HTTP only.
const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https"];

#[derive(Parser, Clone)]
#[command(name = "relayer")]
#[command(about = "Relays an L2 message to its settlement layer and on to the target L2")]
pub struct RelayerCliArgs {
    /// RPC endpoint of the settlement layer (L1)
    #[arg(long)]
    pub l1_rpc_url: String,

    /// RPC endpoint of the L2 the message is relayed to
    #[arg(long)]
    pub l2_relay_to_rpc_url: String,

    /// RPC endpoint of the L2 the message was sent from
    #[arg(long)]
    pub l2_relay_from_rpc_url: String,

    /// Private key of the account paying for relay transactions (32-byte hex)
    #[arg(long)]
    pub wallet_private_key: String,

    /// Hash of the L2 transaction that sent the message
    #[arg(long)]
    pub l2_transaction_hash: String,

    /// Custom network file (TOML or JSON) for the relay-from L2
    #[arg(long)]
    pub network_from: Option<String>,

    /// Custom network file (TOML or JSON) for the relay-to L2
    #[arg(long)]
    pub network_to: Option<String>,
}

impl fmt::Debug for RelayerCliArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerCliArgs")
            .field("l1_rpc_url", &self.l1_rpc_url)
            .field("l2_relay_to_rpc_url", &self.l2_relay_to_rpc_url)
            .field("l2_relay_from_rpc_url", &self.l2_relay_from_rpc_url)
            .field("wallet_private_key", &"<redacted>")
            .field("l2_transaction_hash", &self.l2_transaction_hash)
            .field("network_from", &self.network_from)
            .field("network_to", &self.network_to)
            .finish()
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_url(flag: &str, value: &str) -> Option<String> {
    match url::Url::parse(value) {
        Ok(parsed) if ALLOWED_URL_SCHEMES.contains(&parsed.scheme()) => None,
        Ok(parsed) => Some(format!(
            "--{} must use one of {:?}, got scheme '{}'",
            flag,
            ALLOWED_URL_SCHEMES,
            parsed.scheme()
        )),
        Err(e) => Some(format!("--{} is not a valid URL ('{}'): {}", flag, value, e)),
    }
}

/// Checks every argument and returns one message per problem; empty means valid.
pub fn validate_args(args: &RelayerCliArgs) -> Vec<String> {
    let mut errors = Vec::new();

    for (flag, value) in [
        ("l1-rpc-url", &args.l1_rpc_url),
        ("l2-relay-to-rpc-url", &args.l2_relay_to_rpc_url),
        ("l2-relay-from-rpc-url", &args.l2_relay_from_rpc_url),
    ] {
        errors.extend(validate_url(flag, value));
    }

    if validate_hex_bytes(&ensure_0x(args.wallet_private_key.trim()), 32, "private key").is_err() {
        errors.push("--wallet-private-key must be 32 bytes of hex".to_string());
    }

    if let Err(e) = validate_tx_hash(&args.l2_transaction_hash) {
        errors.push(format!("--l2-transaction-hash: {}", e));
    }

    for (flag, path) in [
        ("network-from", &args.network_from),
        ("network-to", &args.network_to),
    ] {
        if let Some(path) = path {
            if !Path::new(path).is_file() {
                errors.push(format!("--{}: file '{}' does not exist", flag, path));
            }
        }
    }

    errors
}

// ============================================================================
// SETUP AND RUN
// ============================================================================

fn load_network(path: Option<&String>) -> Result<Option<NetworkConfig>, RelayError> {
    path.map(|path| {
        NetworkConfig::load(Path::new(path))
            .map_err(|e| RelayError::InvalidArgument(format!("{:#}", e)))
    })
    .transpose()
}

/// Resolves the chain id behind `rpc_url` and checks it against the network file.
async fn resolve_chain_id(
    rpc_url: &str,
    network: Option<&NetworkConfig>,
    side: &str,
) -> Result<u64, RelayError> {
    let chain_id = EvmClient::new(rpc_url)?.chain_id().await?;
    if let Some(expected) = network.and_then(|n| n.chain_id) {
        if expected != chain_id {
            return Err(RelayError::InvalidArgument(format!(
                "{} network file expects chain id {}, but {} reports {}",
                side, expected, rpc_url, chain_id
            )));
        }
    }
    Ok(chain_id)
}

/// Builds the strategy for the relay-from network.
///
/// Loads the custom network files, resolves both L2 chain ids over RPC,
/// requires the relay-to network to be supported and dispatches on the
/// relay-from network.
pub async fn create_from_args(args: &RelayerCliArgs) -> Result<Box<dyn RelayStrategy>, RelayError> {
    let network_from = load_network(args.network_from.as_ref())?;
    let network_to = load_network(args.network_to.as_ref())?;

    let from_chain_id =
        resolve_chain_id(&args.l2_relay_from_rpc_url, network_from.as_ref(), "relay-from").await?;
    let to_chain_id =
        resolve_chain_id(&args.l2_relay_to_rpc_url, network_to.as_ref(), "relay-to").await?;

    if dispatch::family_of(to_chain_id).is_none() {
        return Err(RelayError::UnsupportedNetwork(to_chain_id));
    }
    info!("Relaying from network {} to network {}", from_chain_id, to_chain_id);

    dispatch::create(
        from_chain_id,
        RelayArgs {
            l1_rpc_url: args.l1_rpc_url.clone(),
            l2_relay_from_rpc_url: args.l2_relay_from_rpc_url.clone(),
            l2_relay_to_rpc_url: args.l2_relay_to_rpc_url.clone(),
            wallet_private_key: args.wallet_private_key.clone(),
            l2_transaction_hash: args.l2_transaction_hash.clone(),
            network_from,
            network_to,
        },
    )
}

/// Validates, builds the strategy and runs it once.
pub async fn run(args: &RelayerCliArgs) -> Result<(), RelayError> {
    let errors = validate_args(args);
    if !errors.is_empty() {
        return Err(RelayError::InvalidArgument(errors.join("; ")));
    }

    let strategy = create_from_args(args).await?;
    info!(
        "Running {} relay for {} on network {}",
        strategy.name(),
        args.l2_transaction_hash,
        strategy.network_id()
    );
    strategy.run().await?;
    info!("Relay of {} completed", args.l2_transaction_hash);
    Ok(())
}

/// Runs the relay until it finishes or `shutdown` resolves with `Ok`.
///
/// Returns `None` when interrupted. A shutdown future that fails (for
/// example, no signal handler could be installed) is ignored and the relay
/// runs to completion.
pub async fn run_until<S>(args: &RelayerCliArgs, shutdown: S) -> Option<Result<(), RelayError>>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = run(args) => Some(result),
        Ok(()) = shutdown => {
            warn!("Interrupted; relay of {} cancelled", args.l2_transaction_hash);
            None
        }
    }
}
