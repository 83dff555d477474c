use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use backbeat_core::db::models::Order;
use backbeat_core::verify::{SolanaRpcClient, SolanaVerifier, Verification, Verifier};

fn onchain_order(signature: &str) -> Order {
    Order {
        id: Uuid::new_v4(),
        buyer_id: Uuid::new_v4(),
        total_price: BigDecimal::from(25),
        currency_used: "USD".to_string(),
        payment_method: "solana_usdc".to_string(),
        status: "processing".to_string(),
        payment_reference: Some(signature.to_string()),
        transaction_signatures: Some(vec![signature.to_string()]),
        split_code: None,
        order_date: Utc::now(),
    }
}

fn status_body(commitment: &str, err: &str) -> String {
    format!(
        r#"{{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {{
                "context": {{"slot": 12345}},
                "value": [{{
                    "slot": 12300,
                    "confirmations": 31,
                    "err": {},
                    "confirmationStatus": "{}"
                }}]
            }}
        }}"#,
        err, commitment
    )
}

#[tokio::test]
async fn confirmed_signature_verifies() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(status_body("confirmed", "null"))
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 3, Duration::from_millis(10));

    let order = onchain_order("sig-abc");
    assert_eq!(verifier.verify(&order).await, Verification::Verified);
}

#[tokio::test]
async fn finalized_signature_verifies() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(status_body("finalized", "null"))
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 3, Duration::from_millis(10));

    let order = onchain_order("sig-abc");
    assert_eq!(verifier.verify(&order).await, Verification::Verified);
}

#[tokio::test]
async fn on_chain_error_rejects() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(status_body("finalized", r#"{"InstructionError": [0, "Custom"]}"#))
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 3, Duration::from_millis(10));

    let order = onchain_order("sig-abc");
    match verifier.verify(&order).await {
        Verification::Rejected { reason } => assert!(reason.contains("on-chain")),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn invisible_signature_exhausts_budget_as_indeterminate() {
    let mut server = mockito::Server::new_async().await;

    // The node never sees the signature; the verifier must stop at its
    // attempt budget and answer indeterminate, not rejected.
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":1},"value":[null]}}"#)
        .expect(4)
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 4, Duration::from_millis(10));

    let order = onchain_order("sig-never-lands");
    assert_eq!(verifier.verify(&order).await, Verification::Indeterminate);
    mock.assert_async().await;
}

#[tokio::test]
async fn rpc_failures_are_swallowed_per_attempt() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 2, Duration::from_millis(10));

    // Node errors on every attempt: still indeterminate, never rejected.
    let order = onchain_order("sig-abc");
    assert_eq!(verifier.verify(&order).await, Verification::Indeterminate);
}

#[tokio::test]
async fn processed_commitment_keeps_polling_until_budget() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(status_body("processed", "null"))
        .create_async()
        .await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 2, Duration::from_millis(10));

    let order = onchain_order("sig-abc");
    assert_eq!(verifier.verify(&order).await, Verification::Indeterminate);
}

#[tokio::test]
async fn missing_signature_is_indeterminate() {
    let server = mockito::Server::new_async().await;

    let client = SolanaRpcClient::new(server.url());
    let verifier = SolanaVerifier::with_polling(client, 1, Duration::ZERO);

    let mut order = onchain_order("sig-abc");
    order.transaction_signatures = None;
    assert_eq!(verifier.verify(&order).await, Verification::Indeterminate);
}
