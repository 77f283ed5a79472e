//! Reservation state machine handlers.
//!
//! The request flow callers follow: reserve, perform the external paid
//! action, then confirm on success or revert on failure. A caller that
//! times out must not assume failure - it either retries until it gets a
//! definitive answer or leaves the reservation to the sweeper.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::{ReservationId, Tool, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))
}

fn parse_reservation_id(raw: &str) -> Result<ReservationId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid reservation ID".into()))
}

fn parse_tool(raw: &str) -> Result<Tool, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown tool: {raw}")))
}

/// Reservation request.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    /// User reserving credits.
    pub user_id: String,
    /// Tool the credits are for.
    pub tool: String,
}

/// Reservation response.
#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    /// Whether the reservation was granted.
    pub granted: bool,
    /// The reservation ID, if granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// The balance at decision time (unchanged by the reservation).
    pub credits: i64,
}

/// Reserve credits for a tool.
///
/// An insufficient balance is not an error here: the response carries
/// `granted = false` and the caller prompts the user to purchase credits.
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ReserveRequest>,
) -> Result<Json<ReserveResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let tool = parse_tool(&body.tool)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        tool = %tool,
        "processing reservation"
    );

    let outcome = state.ledger.reserve(&user_id, tool)?;

    Ok(Json(ReserveResponse {
        granted: outcome.granted,
        reservation_id: outcome.reservation_id.map(|r| r.to_string()),
        credits: outcome.balance,
    }))
}

/// Confirm request.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// The reserving user.
    pub user_id: String,
    /// Description recorded on the confirm row.
    #[serde(default)]
    pub description: Option<String>,
}

/// Confirm response.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    /// Always true on the success path.
    pub success: bool,
    /// Balance after the charge.
    pub remaining_credits: i64,
}

/// Confirm a reservation after the external action succeeded.
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(reservation_id): Path<String>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let reservation_id = parse_reservation_id(&reservation_id)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        reservation_id = %reservation_id,
        "processing confirm"
    );

    let remaining_credits =
        state
            .ledger
            .confirm(&user_id, &reservation_id, body.description.as_deref())?;

    Ok(Json(ConfirmResponse {
        success: true,
        remaining_credits,
    }))
}

/// Reservation lookup query.
#[derive(Debug, Deserialize)]
pub struct ReservationQuery {
    /// The reserving user. Lookups are scoped to the owner.
    pub user_id: String,
}

/// Reservation state response.
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    /// The reservation ID.
    pub reservation_id: String,
    /// Tool the credits were reserved for.
    pub tool: Option<String>,
    /// Credits the confirm would charge.
    pub cost: i64,
    /// Current status: pending, confirmed, or reverted.
    pub status: Option<credit_ledger_core::ReservationStatus>,
    /// When the reservation was made.
    pub created_at: String,
}

/// Look up a reservation's state.
///
/// Lets a caller that crashed between reserve and confirm decide whether
/// the charge landed before retrying. Foreign reservations read as absent.
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(reservation_id): Path<String>,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let user_id = parse_user_id(&query.user_id)?;
    let reservation_id = parse_reservation_id(&reservation_id)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        reservation_id = %reservation_id,
        "reservation lookup"
    );

    let row = state
        .ledger
        .reservation(&reservation_id)?
        .filter(|row| row.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound(format!("reservation not found: {reservation_id}")))?;

    Ok(Json(ReservationResponse {
        reservation_id: reservation_id.to_string(),
        tool: row.tool.map(|t| t.to_string()),
        cost: row.amount,
        status: row.status,
        created_at: row.created_at.to_rfc3339(),
    }))
}

/// Revert request.
#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    /// The reserving user.
    pub user_id: String,
    /// Why the reservation is being closed without charge.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Revert response.
#[derive(Debug, Serialize)]
pub struct RevertResponse {
    /// Always true on the success path.
    pub success: bool,
}

/// Revert a reservation after the external action failed or was abandoned.
pub async fn revert(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(reservation_id): Path<String>,
    Json(body): Json<RevertRequest>,
) -> Result<Json<RevertResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let reservation_id = parse_reservation_id(&reservation_id)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        reservation_id = %reservation_id,
        reason = ?body.reason,
        "processing revert"
    );

    state
        .ledger
        .revert(&user_id, &reservation_id, body.reason.as_deref())?;

    Ok(Json(RevertResponse { success: true }))
}
