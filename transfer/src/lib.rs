//! Bridge transfer library
//!
//! Resumable, serializable state machine for one request/fill transfer and the
//! contract gateway it drives.

pub mod deployment;
pub mod error;
pub mod gateway;
pub mod transfer;
pub mod types;

// Re-export for convenience
pub use deployment::{load_deployment_info, ContractInfo, DeploymentInfo};
pub use error::TransferError;
pub use gateway::{
    ContractGateway, EvmContractGateway, FulfillmentFilter, GatewayConfig, RequestTransaction,
};
pub use transfer::{step_method, StepContext, StepMethod, Transfer};
pub use types::{
    ChainDescriptor, RequestFillMetadata, RequestMetadata, Step, StepId, TokenDescriptor,
    TransferParams, TransferPhase,
};
