//! EVM chain client library
//!
//! Thin JSON-RPC client for EVM chains plus the pieces needed to talk to
//! contracts without generated bindings: ABI encoding/decoding, legacy
//! transaction RLP and a local secp256k1 signer.

pub mod abi;
pub mod client;
pub mod rlp;
pub mod signer;

// Re-export for convenience
pub use abi::Token;
pub use client::{AccountProof, BlockHeader, EvmClient, EvmLog, LogFilter, StorageProof, TransactionReceipt};
pub use ethereum_types::U256;
pub use signer::EvmSigner;
