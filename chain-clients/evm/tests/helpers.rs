//! Shared test helpers for EVM client tests

#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Well-known first Hardhat/Anvil development key (never holds real funds)
pub const DUMMY_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address derived from `DUMMY_PRIVATE_KEY`
pub const DUMMY_SIGNER_ADDR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Dummy contract address (EVM format, 20 bytes)
pub const DUMMY_CONTRACT_ADDR: &str = "0x0000000000000000000000000000000000000010";

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000012";

// ============================================================================
// MOCK BUILDERS
// ============================================================================

/// Mounts a JSON-RPC mock answering `rpc_method` with `result`.
pub async fn mock_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": 1
        })))
        .mount(server)
        .await;
}

/// Receipt JSON with the given status and logs.
pub fn receipt_json(tx_hash: &str, status: &str, logs: serde_json::Value) -> serde_json::Value {
    json!({
        "transactionHash": tx_hash,
        "blockNumber": "0x10",
        "blockHash": format!("0x{}", "ab".repeat(32)),
        "status": status,
        "logs": logs
    })
}
