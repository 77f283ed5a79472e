//! Credit grant integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn grant_credits_success() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .add_header("x-service-name", "payment-service")
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 10,
            "idempotency_key": "payment-abc",
            "description": "10 credit pack",
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    // Welcome credit plus the granted pack.
    assert_eq!(body["balance"], 11);
    assert_eq!(body["duplicate"], false);
}

#[tokio::test]
async fn repeated_idempotency_key_grants_once() {
    let harness = TestHarness::new();

    let request = json!({
        "user_id": harness.test_user_id.to_string(),
        "amount": 10,
        "idempotency_key": "payment-abc",
    });

    harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&request)
        .await
        .assert_status_ok();

    // The webhook retried: same key, no second credit.
    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&request)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 11);
    assert_eq!(body["duplicate"], true);
}

#[tokio::test]
async fn distinct_keys_grant_separately() {
    let harness = TestHarness::new();

    for key in ["payment-1", "payment-2"] {
        harness
            .server
            .post("/v1/credits/grant")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&json!({
                "user_id": harness.test_user_id.to_string(),
                "amount": 5,
                "idempotency_key": key,
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/balance", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 11);
}

#[tokio::test]
async fn grant_to_unseen_user_creates_account_first() {
    let harness = TestHarness::new();

    // The grant path itself triggers account creation with the welcome
    // credit, so the first purchase does not 404.
    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 3,
            "idempotency_key": "payment-xyz",
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 4);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let harness = TestHarness::new();

    for amount in [0, -5] {
        let response = harness
            .server
            .post("/v1/credits/grant")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&json!({
                "user_id": harness.test_user_id.to_string(),
                "amount": amount,
                "idempotency_key": "payment-bad",
            }))
            .await;

        response.assert_status_bad_request();
    }
}

#[tokio::test]
async fn unknown_grant_kind_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 5,
            "kind": "loan",
            "idempotency_key": "payment-loan",
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn bonus_grants_do_not_appear_in_purchase_history() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 2,
            "kind": "bonus",
            "idempotency_key": "promo-1",
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/purchases", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["transactions"].as_array().unwrap().is_empty());
}
