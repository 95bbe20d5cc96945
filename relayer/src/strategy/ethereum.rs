//! Generic ledger relay
//!
//! A message sent on an Ethereum-like chain without a rollup bridge is already
//! where it needs to be. Relaying only waits until the transaction is mined.

use async_trait::async_trait;
use tracing::info;

use super::{client, source_receipt, RelayStrategy};
use crate::config::RelayArgs;
use crate::error::RelayError;

pub struct EthereumRelayStrategy {
    network_id: u64,
    args: RelayArgs,
}

impl EthereumRelayStrategy {
    pub fn new(network_id: u64, args: RelayArgs) -> Self {
        Self { network_id, args }
    }

    pub fn boxed(network_id: u64, args: RelayArgs) -> Box<dyn RelayStrategy> {
        Box::new(Self::new(network_id, args))
    }
}

#[async_trait]
impl RelayStrategy for EthereumRelayStrategy {
    fn name(&self) -> &'static str {
        "ethereum"
    }

    fn network_id(&self) -> u64 {
        self.network_id
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let source = client(&self.args.l2_relay_from_rpc_url)?;
        let receipt = source_receipt(&source, &self.args.l2_transaction_hash).await?;

        info!(
            "Transaction {} mined in block {} on network {}; nothing to relay",
            receipt.transaction_hash,
            receipt.block_number.as_deref().unwrap_or("unknown"),
            self.network_id
        );
        Err(RelayError::AlreadyExecuted(format!(
            "message in {} needs no relay",
            receipt.transaction_hash
        )))
    }
}
