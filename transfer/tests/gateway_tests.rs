//! Unit tests for the EVM contract gateway
//!
//! JSON-RPC endpoints are mocked with wiremock; requests are routed by method name.

use bridge_transfer::gateway::{REQUEST_CREATED_EVENT, REQUEST_FILLED_EVENT};
use bridge_transfer::{
    ContractGateway, EvmContractGateway, FulfillmentFilter, GatewayConfig, RequestTransaction,
};
use chain_clients_evm::abi::{event_topic, u256_topic};
use chain_clients_evm::U256;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    test_signer, DUMMY_FILLER_ADDR, DUMMY_FILL_ID, DUMMY_FILL_MANAGER_ADDR,
    DUMMY_REQUEST_MANAGER_ADDR, DUMMY_SIGNER_ADDR, DUMMY_SOURCE_TOKEN_ADDR,
    DUMMY_TARGET_ACCOUNT, DUMMY_TARGET_TOKEN_ADDR, DUMMY_TX_HASH,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn fast_gateway() -> EvmContractGateway {
    EvmContractGateway::new(GatewayConfig {
        poll_interval_ms: 10,
        wait_timeout_ms: Some(200),
        ..GatewayConfig::default()
    })
}

async fn mock_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
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

/// Mounts the reads performed before a signed transaction is broadcast.
async fn mock_tx_prerequisites(server: &MockServer) {
    mock_rpc(server, "eth_chainId", json!("0x1")).await;
    mock_rpc(server, "eth_getTransactionCount", json!("0x0")).await;
    mock_rpc(server, "eth_gasPrice", json!("0x3b9aca00")).await;
    mock_rpc(server, "eth_estimateGas", json!("0x186a0")).await;
}

fn padded_address(addr: &str) -> String {
    format!("000000000000000000000000{}", addr.strip_prefix("0x").unwrap())
}

fn uint_word(value: u64) -> String {
    format!("{:064x}", value)
}

/// RequestFilled log for request 1 from source chain 1.
fn fill_log() -> serde_json::Value {
    json!({
        "address": DUMMY_FILL_MANAGER_ADDR,
        "topics": [
            event_topic(REQUEST_FILLED_EVENT),
            u256_topic(U256::from(1u64)),
            u256_topic(U256::from(1u64)),
            format!("0x{}", padded_address(DUMMY_TARGET_TOKEN_ADDR))
        ],
        "data": format!(
            "{}{}{}",
            DUMMY_FILL_ID,
            padded_address(DUMMY_FILLER_ADDR),
            uint_word(1)
        ),
        "blockNumber": "0x1f",
        "transactionHash": DUMMY_TX_HASH
    })
}

// ============================================================================
// TOKEN ALLOWANCE
// ============================================================================

/// 1. Test: Sufficient Allowance
/// Verifies that no approval is sent when the current allowance covers the amount.
/// Why: Re-approving on every resume wastes gas and can race pending requests.
#[tokio::test]
async fn test_ensure_token_allowance_skips_when_sufficient() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_call", json!(format!("0x{}", uint_word(10)))).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let tx = fast_gateway()
        .ensure_token_allowance(
            &mock_server.uri(),
            &test_signer(),
            DUMMY_SIGNER_ADDR,
            DUMMY_SOURCE_TOKEN_ADDR,
            DUMMY_REQUEST_MANAGER_ADDR,
            U256::from(5u64),
        )
        .await
        .unwrap();

    assert!(tx.is_none());
}

/// 2. Test: Insufficient Allowance
/// Verifies that an approval is submitted and awaited when the allowance is too low.
/// Why: createRequest reverts without an allowance covering amount and fees.
#[tokio::test]
async fn test_ensure_token_allowance_approves_when_insufficient() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_call", json!(format!("0x{}", uint_word(0)))).await;
    mock_tx_prerequisites(&mock_server).await;
    mock_rpc(&mock_server, "eth_sendRawTransaction", json!(DUMMY_TX_HASH)).await;
    mock_rpc(
        &mock_server,
        "eth_getTransactionReceipt",
        json!({ "transactionHash": DUMMY_TX_HASH, "blockNumber": "0x2", "status": "0x1", "logs": [] }),
    )
    .await;

    let tx = fast_gateway()
        .ensure_token_allowance(
            &mock_server.uri(),
            &test_signer(),
            DUMMY_SIGNER_ADDR,
            DUMMY_SOURCE_TOKEN_ADDR,
            DUMMY_REQUEST_MANAGER_ADDR,
            U256::from(5u64),
        )
        .await
        .unwrap();

    assert_eq!(tx.as_deref(), Some(DUMMY_TX_HASH));
}

// ============================================================================
// REQUEST SUBMISSION
// ============================================================================

/// 3. Test: Request Submission
/// Verifies that send_request_transaction() broadcasts exactly one transaction
/// and returns its hash.
/// Why: Submitting the request is the only write on the source chain.
#[tokio::test]
async fn test_send_request_transaction_returns_hash() {
    let mock_server = MockServer::start().await;
    mock_tx_prerequisites(&mock_server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": DUMMY_TX_HASH,
            "id": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = RequestTransaction {
        amount: U256::from(1u64),
        target_chain_id: 2,
        request_manager: DUMMY_REQUEST_MANAGER_ADDR.to_string(),
        source_token: DUMMY_SOURCE_TOKEN_ADDR.to_string(),
        target_token: DUMMY_TARGET_TOKEN_ADDR.to_string(),
        target_account: DUMMY_TARGET_ACCOUNT.to_string(),
        validity_period: U256::from(3u64),
        fees: U256::from(4u64),
    };
    let tx = fast_gateway()
        .send_request_transaction(&mock_server.uri(), &test_signer(), &request)
        .await
        .unwrap();

    assert_eq!(tx, DUMMY_TX_HASH);
}

/// 4. Test: Request Identifier From Receipt
/// Verifies that get_request_identifier() reads topic 1 of the RequestCreated
/// log emitted by the request manager.
/// Why: The identifier keys the fill lookup on the target chain.
#[tokio::test]
async fn test_get_request_identifier_reads_event() {
    let mock_server = MockServer::start().await;
    mock_rpc(
        &mock_server,
        "eth_getTransactionReceipt",
        json!({
            "transactionHash": DUMMY_TX_HASH,
            "blockNumber": "0x2",
            "status": "0x1",
            "logs": [{
                "address": DUMMY_REQUEST_MANAGER_ADDR,
                "topics": [event_topic(REQUEST_CREATED_EVENT), u256_topic(U256::from(77u64))],
                "data": "0x",
                "transactionHash": DUMMY_TX_HASH
            }]
        }),
    )
    .await;

    let identifier = fast_gateway()
        .get_request_identifier(&mock_server.uri(), DUMMY_REQUEST_MANAGER_ADDR, DUMMY_TX_HASH)
        .await
        .unwrap();

    assert_eq!(identifier, U256::from(77u64));
}

/// 5. Test: Missing RequestCreated Event
/// Verifies that get_request_identifier() fails if the event came from another contract.
/// Why: Trusting a look-alike event from an arbitrary contract would track a fake request.
#[tokio::test]
async fn test_get_request_identifier_ignores_other_contracts() {
    let mock_server = MockServer::start().await;
    mock_rpc(
        &mock_server,
        "eth_getTransactionReceipt",
        json!({
            "transactionHash": DUMMY_TX_HASH,
            "blockNumber": "0x2",
            "status": "0x1",
            "logs": [{
                "address": DUMMY_FILL_MANAGER_ADDR,
                "topics": [event_topic(REQUEST_CREATED_EVENT), u256_topic(U256::from(77u64))],
                "data": "0x"
            }]
        }),
    )
    .await;

    let err = fast_gateway()
        .get_request_identifier(&mock_server.uri(), DUMMY_REQUEST_MANAGER_ADDR, DUMMY_TX_HASH)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("No RequestCreated event"));
}

// ============================================================================
// FULFILLMENT
// ============================================================================

/// 6. Test: Fill Observed
/// Verifies that wait_for_fulfillment() returns fill id, filler and fill
/// transaction hash from the RequestFilled log.
/// Why: The fill metadata is the proof of delivery stored with the transfer.
#[tokio::test]
async fn test_wait_for_fulfillment_parses_fill() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_blockNumber", json!("0x20")).await;
    mock_rpc(&mock_server, "eth_getLogs", json!([fill_log()])).await;

    let fill = fast_gateway()
        .wait_for_fulfillment(
            &mock_server.uri(),
            DUMMY_FILL_MANAGER_ADDR,
            &FulfillmentFilter {
                identifier: U256::from(1u64),
                source_chain_id: 1,
                from_block: 0,
            },
        )
        .await
        .unwrap();

    assert_eq!(fill.fill_transaction_hash, DUMMY_TX_HASH);
    assert_eq!(fill.filler, DUMMY_FILLER_ADDR);
    assert_eq!(fill.fill_id, DUMMY_FILL_ID);
}

/// 7. Test: Bounded Fulfillment Wait
/// Verifies that a configured wait_timeout_ms turns an unobserved fill into an error.
/// Why: Hosts that opt into a timeout must regain control instead of blocking forever.
#[tokio::test]
async fn test_wait_for_fulfillment_times_out() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_blockNumber", json!("0x20")).await;
    mock_rpc(&mock_server, "eth_getLogs", json!([])).await;

    let gateway = EvmContractGateway::new(GatewayConfig {
        poll_interval_ms: 10,
        wait_timeout_ms: Some(50),
        ..GatewayConfig::default()
    });
    let err = gateway
        .wait_for_fulfillment(
            &mock_server.uri(),
            DUMMY_FILL_MANAGER_ADDR,
            &FulfillmentFilter {
                identifier: U256::from(1u64),
                source_chain_id: 1,
                from_block: 0,
            },
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Timed out waiting for fulfillment"));
}

/// 8. Test: Default Waiting Policy
/// Verifies that the default gateway config polls every 2s and never times out.
/// Why: Waits block until the event is observed unless the host opts into a bound.
#[test]
fn test_default_gateway_config() {
    let config = GatewayConfig::default();
    assert_eq!(config.poll_interval_ms, 2000);
    assert_eq!(config.wait_timeout_ms, None);
    assert_eq!(config.log_block_range, 10_000);

    let parsed: GatewayConfig = serde_json::from_value(json!({})).unwrap();
    assert_eq!(parsed, config);
}

/// 9. Test: Chunked Log Scan
/// Verifies that wait_for_fulfillment() splits a wide block range into
/// eth_getLogs queries of at most log_block_range blocks and finds a fill in
/// the last chunk.
/// Why: Providers reject eth_getLogs over wide ranges, so a fill far from
/// from_block would otherwise never be observed.
#[tokio::test]
async fn test_wait_for_fulfillment_scans_in_bounded_chunks() {
    let mock_server = MockServer::start().await;
    mock_rpc(&mock_server, "eth_blockNumber", json!("0x2f")).await;

    for (from, to) in [("0x0", "0x9"), ("0xa", "0x13"), ("0x14", "0x1d"), ("0x1e", "0x27")] {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getLogs",
                "params": [{ "fromBlock": from, "toBlock": to }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "result": [],
                "id": 1
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getLogs",
            "params": [{ "fromBlock": "0x28", "toBlock": "0x2f" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": [fill_log()],
            "id": 1
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = EvmContractGateway::new(GatewayConfig {
        poll_interval_ms: 10,
        wait_timeout_ms: Some(200),
        log_block_range: 10,
    });
    let fill = gateway
        .wait_for_fulfillment(
            &mock_server.uri(),
            DUMMY_FILL_MANAGER_ADDR,
            &FulfillmentFilter {
                identifier: U256::from(1u64),
                source_chain_id: 1,
                from_block: 0,
            },
        )
        .await
        .unwrap();

    assert_eq!(fill.fill_transaction_hash, DUMMY_TX_HASH);
}
