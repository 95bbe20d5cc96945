//! Transfer state machine
//!
//! Drives one request/fill transfer through its ordered steps. Progress lives in
//! the metadata fields, so an encoded transfer can be decoded after a restart
//! and `execute` resumes at the first unsatisfied step.

use chain_clients_common::validate_evm_address;
use chain_clients_evm::{EvmSigner, U256};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info};

use crate::error::TransferError;
use crate::gateway::{ContractGateway, FulfillmentFilter, RequestTransaction};
use crate::types::{
    u256_decimal, ChainDescriptor, RequestFillMetadata, RequestMetadata, Step, StepId,
    TokenDescriptor, TransferParams, TransferPhase,
};

/// Borrowed collaborators handed to every step executor.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub gateway: &'a dyn ContractGateway,
    pub signer: &'a EvmSigner,
    pub signer_address: &'a str,
}

/// Executor for one step.
pub type StepMethod =
    for<'a> fn(&'a mut Transfer, StepContext<'a>) -> BoxFuture<'a, Result<(), TransferError>>;

/// One cross-chain request, from submission on the source chain to the fill on the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    #[serde(with = "u256_decimal")]
    amount: U256,
    source_chain: ChainDescriptor,
    target_chain: ChainDescriptor,
    source_token: TokenDescriptor,
    target_token: TokenDescriptor,
    target_account: String,
    #[serde(with = "u256_decimal")]
    validity_period: U256,
    #[serde(with = "u256_decimal")]
    fees: U256,
    request_metadata: RequestMetadata,
    #[serde(default)]
    request_fill_metadata: Option<RequestFillMetadata>,
    steps: Vec<Step>,
}

// ============================================================================
// STEP TABLE
// ============================================================================

fn run_ensure_token_allowance<'a>(
    transfer: &'a mut Transfer,
    ctx: StepContext<'a>,
) -> BoxFuture<'a, Result<(), TransferError>> {
    Box::pin(transfer.ensure_token_allowance(ctx.gateway, ctx.signer, ctx.signer_address))
}

fn run_send_request_transaction<'a>(
    transfer: &'a mut Transfer,
    ctx: StepContext<'a>,
) -> BoxFuture<'a, Result<(), TransferError>> {
    Box::pin(transfer.send_request_transaction(ctx.gateway, ctx.signer, ctx.signer_address))
}

fn run_wait_for_request_event<'a>(
    transfer: &'a mut Transfer,
    ctx: StepContext<'a>,
) -> BoxFuture<'a, Result<(), TransferError>> {
    Box::pin(transfer.wait_for_request_event(ctx.gateway))
}

fn run_wait_for_fulfillment<'a>(
    transfer: &'a mut Transfer,
    ctx: StepContext<'a>,
) -> BoxFuture<'a, Result<(), TransferError>> {
    Box::pin(transfer.wait_for_fulfillment(ctx.gateway))
}

/// Executor for a step identifier. Exhaustive, so a new step without an
/// executor does not compile.
pub fn step_method(step: StepId) -> StepMethod {
    match step {
        StepId::EnsureTokenAllowance => run_ensure_token_allowance,
        StepId::SendRequestTransaction => run_send_request_transaction,
        StepId::WaitForRequestEvent => run_wait_for_request_event,
        StepId::WaitForFulfillment => run_wait_for_fulfillment,
    }
}

// ============================================================================
// CONSTRUCTION AND SERIALIZATION
// ============================================================================

impl Transfer {
    /// Creates a transfer with empty metadata and the default step order.
    pub fn new(params: TransferParams) -> Result<Self, TransferError> {
        Self::with_steps(params, StepId::ALL.iter().copied().map(Step::new).collect())
    }

    /// Creates a transfer with a custom step order.
    pub fn with_steps(params: TransferParams, steps: Vec<Step>) -> Result<Self, TransferError> {
        let mut transfer = Self {
            amount: params.amount,
            source_chain: params.source_chain,
            target_chain: params.target_chain,
            source_token: params.source_token,
            target_token: params.target_token,
            target_account: params.target_account,
            validity_period: params.validity_period,
            fees: params.fees,
            request_metadata: RequestMetadata::default(),
            request_fill_metadata: None,
            steps,
        };
        transfer.normalize();
        transfer.validate()?;
        Ok(transfer)
    }

    /// Persisted form of the transfer.
    pub fn encode(&self) -> Result<serde_json::Value, TransferError> {
        serde_json::to_value(self)
            .map_err(|e| TransferError::InvalidTransfer(format!("failed to encode transfer: {}", e)))
    }

    /// Restores a transfer from its persisted form, checking every invariant.
    pub fn decode(value: serde_json::Value) -> Result<Self, TransferError> {
        let mut transfer: Transfer = serde_json::from_value(value)
            .map_err(|e| TransferError::InvalidTransfer(format!("failed to decode transfer: {}", e)))?;
        transfer.normalize();
        transfer.validate()?;
        Ok(transfer)
    }

    /// Brings persisted state into canonical form: empty metadata strings
    /// count as unset, and a step flagged completed without the metadata it
    /// produces is reset so `execute` runs it again.
    fn normalize(&mut self) {
        let metadata = &mut self.request_metadata;
        if metadata.request_account.as_deref() == Some("") {
            metadata.request_account = None;
        }
        if metadata.transaction_hash.as_deref() == Some("") {
            metadata.transaction_hash = None;
        }

        for index in 0..self.steps.len() {
            let step = self.steps[index].identifier;
            if self.steps[index].completed && self.step_output(step) == Some(false) {
                debug!("Resetting step {}: completed without its metadata", step);
                self.steps[index].completed = false;
            }
        }
    }

    fn validate(&self) -> Result<(), TransferError> {
        if self.steps.is_empty() {
            return Err(TransferError::InvalidTransfer("steps must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.identifier) {
                return Err(TransferError::InvalidTransfer(format!(
                    "duplicate step {}",
                    step.identifier
                )));
            }
        }
        validate_evm_address(&self.target_account)
            .map_err(|e| TransferError::InvalidTransfer(format!("target account: {}", e)))?;
        if self.request_metadata.identifier.is_some() && !self.has_transaction_hash() {
            return Err(TransferError::InvalidTransfer(
                "request identifier set without transaction hash".into(),
            ));
        }
        if self.request_fill_metadata.is_some() && self.request_metadata.identifier.is_none() {
            return Err(TransferError::InvalidTransfer(
                "fill metadata set without request identifier".into(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn fees(&self) -> U256 {
        self.fees
    }

    pub fn validity_period(&self) -> U256 {
        self.validity_period
    }

    pub fn source_chain(&self) -> &ChainDescriptor {
        &self.source_chain
    }

    pub fn target_chain(&self) -> &ChainDescriptor {
        &self.target_chain
    }

    pub fn source_token(&self) -> &TokenDescriptor {
        &self.source_token
    }

    pub fn target_token(&self) -> &TokenDescriptor {
        &self.target_token
    }

    pub fn target_account(&self) -> &str {
        &self.target_account
    }

    pub fn request_metadata(&self) -> &RequestMetadata {
        &self.request_metadata
    }

    pub fn request_fill_metadata(&self) -> Option<&RequestFillMetadata> {
        self.request_fill_metadata.as_ref()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Phase derived from the populated metadata fields.
    pub fn phase(&self) -> TransferPhase {
        if self.request_fill_metadata.is_some() {
            TransferPhase::Fulfilled
        } else if self.request_metadata.identifier.is_some() {
            TransferPhase::Confirmed
        } else if self.has_transaction_hash() {
            TransferPhase::Requested
        } else {
            TransferPhase::Created
        }
    }

    /// True once the last step completed or any step failed.
    pub fn is_terminal(&self) -> bool {
        let last_completed = self.steps.last().map(|s| s.completed).unwrap_or(false);
        last_completed || self.steps.iter().any(|s| s.error_message.is_some())
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Executors for every declared step, keyed by identifier.
    pub fn get_step_methods(&self) -> BTreeMap<StepId, StepMethod> {
        self.steps
            .iter()
            .map(|step| (step.identifier, step_method(step.identifier)))
            .collect()
    }

    /// Whether the metadata `step` writes is present; `None` for steps that
    /// write none.
    fn step_output(&self, step: StepId) -> Option<bool> {
        match step {
            StepId::EnsureTokenAllowance => None,
            StepId::SendRequestTransaction => Some(self.has_transaction_hash()),
            StepId::WaitForRequestEvent => Some(self.request_metadata.identifier.is_some()),
            StepId::WaitForFulfillment => Some(self.request_fill_metadata.is_some()),
        }
    }

    fn has_transaction_hash(&self) -> bool {
        self.request_metadata
            .transaction_hash
            .as_deref()
            .map(|hash| !hash.is_empty())
            .unwrap_or(false)
    }

    /// Whether the metadata already reflects the effect of `step`.
    fn is_step_satisfied(&self, step: StepId) -> bool {
        match step {
            StepId::EnsureTokenAllowance => self.has_transaction_hash(),
            other => self.step_output(other).unwrap_or(false),
        }
    }

    /// Runs the steps in order, skipping those already done.
    ///
    /// A failing step gets its `error_message` recorded and the error is
    /// returned as [`TransferError::StepExecution`]. Calling `execute` again
    /// resumes at that step.
    pub async fn execute(
        &mut self,
        gateway: &dyn ContractGateway,
        signer: &EvmSigner,
        signer_address: &str,
    ) -> Result<(), TransferError> {
        let ctx = StepContext {
            gateway,
            signer,
            signer_address,
        };

        for index in 0..self.steps.len() {
            let step = self.steps[index].identifier;
            if self.steps[index].completed || self.is_step_satisfied(step) {
                debug!("Skipping step {}: already done", step);
                self.steps[index].completed = true;
                continue;
            }

            info!("Executing step {}", step);
            let method = step_method(step);
            match method(self, ctx).await {
                Ok(()) => {
                    let entry = &mut self.steps[index];
                    entry.completed = true;
                    entry.error_message = None;
                }
                Err(e) => {
                    error!("Step {} failed: {}", step, e);
                    self.steps[index].error_message = Some(e.to_string());
                    return Err(TransferError::StepExecution {
                        step,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("Transfer completed in phase {:?}", self.phase());
        Ok(())
    }

    /// Approves `amount + fees` of the source token to the source request manager.
    pub async fn ensure_token_allowance(
        &mut self,
        gateway: &dyn ContractGateway,
        signer: &EvmSigner,
        signer_address: &str,
    ) -> Result<(), TransferError> {
        let required = self
            .amount
            .checked_add(self.fees)
            .ok_or(TransferError::Overflow)?;

        gateway
            .ensure_token_allowance(
                &self.source_chain.rpc_url,
                signer,
                signer_address,
                &self.source_token.address,
                &self.source_chain.request_manager_address,
                required,
            )
            .await?;
        Ok(())
    }

    /// Submits the request to the source chain's request manager.
    pub async fn send_request_transaction(
        &mut self,
        gateway: &dyn ContractGateway,
        signer: &EvmSigner,
        signer_address: &str,
    ) -> Result<(), TransferError> {
        let request = RequestTransaction {
            amount: self.amount,
            target_chain_id: self.target_chain.identifier,
            request_manager: self.source_chain.request_manager_address.clone(),
            source_token: self.source_token.address.clone(),
            target_token: self.target_token.address.clone(),
            target_account: self.target_account.clone(),
            validity_period: self.validity_period,
            fees: self.fees,
        };

        let transaction_hash = gateway
            .send_request_transaction(&self.source_chain.rpc_url, signer, &request)
            .await?;

        self.request_metadata.request_account = Some(signer_address.to_string());
        self.request_metadata.transaction_hash = Some(transaction_hash);
        Ok(())
    }

    /// Reads the request identifier once the request transaction is mined.
    pub async fn wait_for_request_event(
        &mut self,
        gateway: &dyn ContractGateway,
    ) -> Result<(), TransferError> {
        let transaction_hash = self
            .request_metadata
            .transaction_hash
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .ok_or(TransferError::Precondition("transaction hash not set"))?;

        let identifier = gateway
            .get_request_identifier(
                &self.source_chain.rpc_url,
                &self.source_chain.request_manager_address,
                transaction_hash,
            )
            .await?;

        self.request_metadata.identifier = Some(identifier);
        Ok(())
    }

    /// Blocks until the target chain's fill manager reports the fill.
    pub async fn wait_for_fulfillment(
        &mut self,
        gateway: &dyn ContractGateway,
    ) -> Result<(), TransferError> {
        let identifier = self
            .request_metadata
            .identifier
            .ok_or(TransferError::Precondition("request identifier not set"))?;

        let filter = FulfillmentFilter {
            identifier,
            source_chain_id: self.source_chain.identifier,
            from_block: self.target_chain.fill_manager_deployment_block,
        };
        let fill = gateway
            .wait_for_fulfillment(
                &self.target_chain.rpc_url,
                &self.target_chain.fill_manager_address,
                &filter,
            )
            .await?;

        self.request_fill_metadata = Some(fill);
        Ok(())
    }
}
