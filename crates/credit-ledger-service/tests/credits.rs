//! Account, balance, and history integration tests.

mod common;

use common::TestHarness;

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn first_access_creates_account_with_welcome_grant() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/accounts/{}", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 1);
    assert_eq!(body["total_earned"], 1);
    assert_eq!(body["total_spent"], 0);
}

#[tokio::test]
async fn repeated_access_does_not_grant_welcome_again() {
    let harness = TestHarness::new();

    for _ in 0..3 {
        harness
            .server
            .get(&format!("/v1/accounts/{}", harness.test_user_id))
            .add_header("x-api-key", harness.service_api_key.as_str())
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/balance", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 1);
}

#[tokio::test]
async fn zero_welcome_config_creates_empty_account() {
    let harness = TestHarness::with_welcome_credits(0);

    let response = harness
        .server
        .get(&format!("/v1/accounts/{}", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 0);
    assert_eq!(body["total_earned"], 0);
}

#[tokio::test]
async fn invalid_user_id_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/accounts/not-a-uuid")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_bad_request();
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/balance", harness.test_user_id))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/balance", harness.test_user_id))
        .add_header("x-api-key", "wrong-key")
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn health_needs_no_auth() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn purchase_history_lists_grants_newest_first() {
    let harness = TestHarness::new();

    for i in 0..3 {
        harness
            .server
            .post("/v1/credits/grant")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&serde_json::json!({
                "user_id": harness.test_user_id.to_string(),
                "amount": i + 1,
                "idempotency_key": format!("payment-{i}"),
                "description": format!("purchase {i}"),
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/purchases", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    // Welcome bonus is a bonus row, not a purchase; only the grants appear.
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0]["amount"], 3);
    assert_eq!(transactions[2]["amount"], 1);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn purchase_history_paginates() {
    let harness = TestHarness::new();

    for i in 0..5 {
        harness
            .server
            .post("/v1/credits/grant")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&serde_json::json!({
                "user_id": harness.test_user_id.to_string(),
                "amount": 1,
                "idempotency_key": format!("payment-{i}"),
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&format!(
            "/v1/credits/{}/purchases?limit=2&offset=0",
            harness.test_user_id
        ))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], true);
}

#[tokio::test]
async fn usage_history_empty_for_fresh_account() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/usage", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn usage_totals_aggregate_confirmed_reservations() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    // Fund the account beyond the welcome grant.
    harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&serde_json::json!({
            "user_id": user_id,
            "amount": 5,
            "idempotency_key": "payment-1",
        }))
        .await
        .assert_status_ok();

    // Two confirmed cv_review uses, one confirmed job_match.
    for tool in ["cv_review", "cv_review", "job_match"] {
        let reserve: serde_json::Value = harness
            .server
            .post("/v1/reservations")
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&serde_json::json!({ "user_id": user_id, "tool": tool }))
            .await
            .json();
        assert_eq!(reserve["granted"], true);

        harness
            .server
            .post(&format!(
                "/v1/reservations/{}/confirm",
                reserve["reservation_id"].as_str().unwrap()
            ))
            .add_header("x-api-key", harness.service_api_key.as_str())
            .json(&serde_json::json!({ "user_id": user_id }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&format!("/v1/credits/{}/usage/totals", harness.test_user_id))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let totals = body["totals"].as_array().unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0]["tool"], "cv_review");
    assert_eq!(totals[0]["uses"], 2);
    assert_eq!(totals[0]["credits"], 2);
    assert_eq!(totals[1]["tool"], "job_match");
    assert_eq!(totals[1]["uses"], 1);
}
