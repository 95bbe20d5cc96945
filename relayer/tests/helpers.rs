//! Shared test helpers for relayer tests

#![allow(dead_code)]

use chain_clients_evm::abi::{self, event_topic};
use relayer::program::RelayerCliArgs;
use relayer::RelayArgs;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Well-known first Hardhat/Anvil development key (never holds real funds)
pub const DUMMY_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Dummy L2 transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000042";

/// Dummy withdrawal hash (64 hex characters)
pub const DUMMY_WITHDRAWAL_HASH: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000aa";

/// Dummy sender address (EVM format, 20 bytes)
pub const DUMMY_SENDER_ADDR: &str = "0x0000000000000000000000000000000000000001";

/// Dummy target address (EVM format, 20 bytes)
pub const DUMMY_TARGET_ADDR: &str = "0x0000000000000000000000000000000000000002";

/// Dummy L1 contract address used through network files (EVM format, 20 bytes)
pub const DUMMY_L1_CONTRACT_ADDR: &str = "0x0000000000000000000000000000000000000030";

/// Network id that no strategy is registered for
pub const UNSUPPORTED_NETWORK_ID: u64 = 999_999;

// ============================================================================
// ARGUMENT BUILDERS
// ============================================================================

/// Relay arguments with every RPC endpoint pointed at `rpc_url`.
pub fn relay_args(rpc_url: &str) -> RelayArgs {
    RelayArgs {
        l1_rpc_url: rpc_url.to_string(),
        l2_relay_from_rpc_url: rpc_url.to_string(),
        l2_relay_to_rpc_url: rpc_url.to_string(),
        wallet_private_key: DUMMY_PRIVATE_KEY.to_string(),
        l2_transaction_hash: DUMMY_TX_HASH.to_string(),
        network_from: None,
        network_to: None,
    }
}

/// CLI arguments with distinct relay-from and relay-to endpoints.
pub fn cli_args(l1_rpc_url: &str, from_rpc_url: &str, to_rpc_url: &str) -> RelayerCliArgs {
    RelayerCliArgs {
        l1_rpc_url: l1_rpc_url.to_string(),
        l2_relay_to_rpc_url: to_rpc_url.to_string(),
        l2_relay_from_rpc_url: from_rpc_url.to_string(),
        wallet_private_key: DUMMY_PRIVATE_KEY.to_string(),
        l2_transaction_hash: DUMMY_TX_HASH.to_string(),
        network_from: None,
        network_to: None,
    }
}

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

/// Mounts an `eth_call` mock for one view function, routed by its selector.
pub async fn mock_view(server: &MockServer, signature: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .and(body_string_contains(hex::encode(abi::selector(signature))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": 1
        })))
        .mount(server)
        .await;
}

/// Mounts the reads performed before a signed transaction is broadcast.
pub async fn mock_tx_prerequisites(server: &MockServer) {
    mock_rpc(server, "eth_chainId", json!("0x1")).await;
    mock_rpc(server, "eth_getTransactionCount", json!("0x0")).await;
    mock_rpc(server, "eth_gasPrice", json!("0x3b9aca00")).await;
    mock_rpc(server, "eth_estimateGas", json!("0x30d40")).await;
}

/// Expects exactly one submitted transaction calling `signature`.
///
/// The selector is matched inside the signed raw transaction, so a submission
/// of any other function finds no mock and fails the relay.
pub async fn expect_one_submission(server: &MockServer, signature: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .and(body_string_contains(hex::encode(abi::selector(signature))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": DUMMY_TX_HASH,
            "id": 1
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Fails the test if any transaction is submitted to `server`.
pub async fn forbid_submissions(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": DUMMY_TX_HASH,
            "id": 1
        })))
        .expect(0)
        .mount(server)
        .await;
}

/// ABI-encoded return data of a view function.
pub fn return_data(tokens: &[abi::Token]) -> serde_json::Value {
    json!(format!("0x{}", hex::encode(abi::encode(tokens))))
}

/// Block header with `timestamp`, optionally carrying Arbitrum's `sendCount`.
pub fn block_json(timestamp: u64, send_count: Option<u64>) -> serde_json::Value {
    let mut block = json!({
        "number": "0x20",
        "hash": format!("0x{}", "cd".repeat(32)),
        "stateRoot": format!("0x{}", "ef".repeat(32)),
        "timestamp": format!("{:#x}", timestamp)
    });
    if let Some(count) = send_count {
        block["sendCount"] = json!(format!("{:#x}", count));
    }
    block
}

/// ABI word holding `true`, as returned by a view function.
pub fn true_word() -> serde_json::Value {
    json!(format!("0x{:0>64}", "1"))
}

/// Successful receipt of `DUMMY_TX_HASH` carrying `logs`.
pub fn receipt_json(logs: serde_json::Value) -> serde_json::Value {
    json!({
        "transactionHash": DUMMY_TX_HASH,
        "blockNumber": "0x10",
        "blockHash": format!("0x{}", "ab".repeat(32)),
        "status": "0x1",
        "logs": logs
    })
}

/// Log emitted by `address` for `event_signature`.
pub fn log_json(
    address: &str,
    event_signature: &str,
    indexed: &[String],
    data: &[u8],
) -> serde_json::Value {
    let mut topics = vec![event_topic(event_signature)];
    topics.extend(indexed.iter().cloned());
    json!({
        "address": address,
        "topics": topics,
        "data": format!("0x{}", hex::encode(data)),
        "blockNumber": "0x10",
        "transactionHash": DUMMY_TX_HASH,
        "logIndex": "0x0"
    })
}

/// Left-pads a short hex value to a 32-byte topic.
pub fn topic(value: &str) -> String {
    format!("0x{:0>64}", value.trim_start_matches("0x"))
}

/// Encodes log data with the ABI head/tail layout.
pub fn log_data(tokens: &[abi::Token]) -> Vec<u8> {
    abi::encode(tokens)
}
