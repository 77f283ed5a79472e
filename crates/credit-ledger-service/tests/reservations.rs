//! Reservation protocol integration tests.

mod common;

use chrono::{Duration, Utc};
use common::TestHarness;
use credit_ledger_core::UserId;
use serde_json::json;

async fn grant(harness: &TestHarness, user_id: &str, amount: i64, key: &str) {
    harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({
            "user_id": user_id,
            "amount": amount,
            "idempotency_key": key,
        }))
        .await
        .assert_status_ok();
}

async fn reserve(harness: &TestHarness, user_id: &str, tool: &str) -> serde_json::Value {
    harness
        .server
        .post("/v1/reservations")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id, "tool": tool }))
        .await
        .json()
}

async fn balance(harness: &TestHarness, user_id: &str) -> i64 {
    let body: serde_json::Value = harness
        .server
        .get(&format!("/v1/credits/{user_id}/balance"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await
        .json();
    body["credits"].as_i64().unwrap()
}

// ============================================================================
// Reserve
// ============================================================================

#[tokio::test]
async fn reserve_leaves_balance_untouched() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let body = reserve(&harness, &user_id, "cv_review").await;
    assert_eq!(body["granted"], true);
    assert!(body["reservation_id"].is_string());

    // The welcome credit is still spendable until confirm.
    assert_eq!(balance(&harness, &user_id).await, 1);
}

#[tokio::test]
async fn reserve_with_insufficient_credits_is_declined_not_an_error() {
    let harness = TestHarness::with_welcome_credits(0);
    let user_id = harness.test_user_id.to_string();

    let response = harness
        .server
        .post("/v1/reservations")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id, "tool": "cv_create" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["granted"], false);
    assert!(body["reservation_id"].is_null());
    assert_eq!(body["credits"], 0);
}

#[tokio::test]
async fn reserve_unknown_tool_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/reservations")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "tool": "crystal_ball",
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn concurrent_reservations_may_exceed_balance() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    // One credit, two grants: reserve is optimistic, both succeed.
    let first = reserve(&harness, &user_id, "cv_review").await;
    let second = reserve(&harness, &user_id, "job_match").await;
    assert_eq!(first["granted"], true);
    assert_eq!(second["granted"], true);
}

// ============================================================================
// Confirm
// ============================================================================

#[tokio::test]
async fn confirm_charges_exactly_once() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let body = reserve(&harness, &user_id, "cv_review").await;
    let reservation_id = body["reservation_id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;

    response.assert_status_ok();
    let confirm: serde_json::Value = response.json();
    assert_eq!(confirm["success"], true);
    assert_eq!(confirm["remaining_credits"], 0);

    // A retried confirm must not double charge.
    let retry = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;

    retry.assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(balance(&harness, &user_id).await, 0);
}

#[tokio::test]
async fn confirm_rechecks_balance_authoritatively() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    // Both reservations granted against the single welcome credit.
    let first = reserve(&harness, &user_id, "cv_review").await;
    let second = reserve(&harness, &user_id, "job_match").await;

    harness
        .server
        .post(&format!(
            "/v1/reservations/{}/confirm",
            first["reservation_id"].as_str().unwrap()
        ))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status_ok();

    // The second confirm finds the balance drained: payment required, and
    // the reservation stays pending rather than closing.
    let response = harness
        .server
        .post(&format!(
            "/v1/reservations/{}/confirm",
            second["reservation_id"].as_str().unwrap()
        ))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;

    response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(balance(&harness, &user_id).await, 0);

    // Topping up makes the retried confirm succeed.
    grant(&harness, &user_id, 1, "topup-1").await;
    harness
        .server
        .post(&format!(
            "/v1/reservations/{}/confirm",
            second["reservation_id"].as_str().unwrap()
        ))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn confirm_unknown_reservation_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/reservations/01ARZ3NDEKTSV4RRFFQ69G5FAV/confirm")
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": harness.test_user_id.to_string() }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn confirm_foreign_reservation_is_not_found() {
    let harness = TestHarness::new();
    let owner = harness.test_user_id.to_string();
    let intruder = UserId::generate().to_string();

    let body = reserve(&harness, &owner, "cv_review").await;
    let reservation_id = body["reservation_id"].as_str().unwrap();

    // Another user cannot close someone else's reservation, and the
    // response does not reveal that it exists.
    let response = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": intruder }))
        .await;

    response.assert_status_not_found();
    assert_eq!(balance(&harness, &owner).await, 1);
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn lookup_reports_reservation_state() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let body = reserve(&harness, &user_id, "cv_review").await;
    let reservation_id = body["reservation_id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .get(&format!("/v1/reservations/{reservation_id}?user_id={user_id}"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await;

    response.assert_status_ok();
    let state: serde_json::Value = response.json();
    assert_eq!(state["status"], "pending");
    assert_eq!(state["tool"], "cv_review");
    assert_eq!(state["cost"], 1);

    harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status_ok();

    let state: serde_json::Value = harness
        .server
        .get(&format!("/v1/reservations/{reservation_id}?user_id={user_id}"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await
        .json();
    assert_eq!(state["status"], "confirmed");

    // Other users see nothing.
    let foreign = UserId::generate();
    harness
        .server
        .get(&format!("/v1/reservations/{reservation_id}?user_id={foreign}"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .await
        .assert_status_not_found();
}

// ============================================================================
// Revert
// ============================================================================

#[tokio::test]
async fn revert_never_changes_balance() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let body = reserve(&harness, &user_id, "cv_create").await;
    let reservation_id = body["reservation_id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/revert"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id, "reason": "generation failed" }))
        .await;

    response.assert_status_ok();
    assert_eq!(balance(&harness, &user_id).await, 1);

    // The reverted reservation can no longer be confirmed.
    let confirm = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;

    confirm.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn revert_after_confirm_is_rejected() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let body = reserve(&harness, &user_id, "cv_review").await;
    let reservation_id = body["reservation_id"].as_str().unwrap().to_string();

    harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/revert"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;

    // The charge stands; revert cannot refund a confirmed reservation.
    response.assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(balance(&harness, &user_id).await, 0);
}

// ============================================================================
// Expiration sweep
// ============================================================================

#[tokio::test]
async fn sweep_reverts_abandoned_reservations() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    let abandoned = reserve(&harness, &user_id, "cv_review").await;
    let reservation_id = abandoned["reservation_id"].as_str().unwrap().to_string();

    // Drive the sweep from a point past the TTL.
    let future = Utc::now() + Duration::seconds(3601);
    let report = harness.ledger.sweep_expired(future, 256).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.reverted, 1);
    assert_eq!(report.skipped, 0);

    // The swept reservation is closed and the credit was never charged.
    assert_eq!(balance(&harness, &user_id).await, 1);
    let confirm = harness
        .server
        .post(&format!("/v1/reservations/{reservation_id}/confirm"))
        .add_header("x-api-key", harness.service_api_key.as_str())
        .json(&json!({ "user_id": user_id }))
        .await;
    confirm.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn sweep_leaves_fresh_reservations_pending() {
    let harness = TestHarness::new();
    let user_id = harness.test_user_id.to_string();

    reserve(&harness, &user_id, "cv_review").await;

    let report = harness.ledger.sweep_expired(Utc::now(), 256).unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(report.reverted, 0);
}
