//! Account, balance, grant, and history handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::{CreditTransaction, TransactionKind, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::ledger::ToolUsage;
use crate::state::AppState;

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))
}

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// The user ID.
    pub user_id: String,
    /// Current spendable balance.
    pub credits: i64,
    /// Lifetime credits granted.
    pub total_earned: i64,
    /// Lifetime credits confirmed as consumed.
    pub total_spent: i64,
    /// Account creation time.
    pub created_at: String,
}

/// Get the user's account, creating it on first access.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let account = state.ledger.account(&user_id)?;

    Ok(Json(AccountResponse {
        user_id: account.user_id.to_string(),
        credits: account.credits,
        total_earned: account.total_earned,
        total_spent: account.total_spent,
        created_at: account.created_at.to_rfc3339(),
    }))
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current spendable balance.
    pub credits: i64,
}

/// Get the current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let credits = state.ledger.balance(&user_id)?;

    Ok(Json(BalanceResponse { credits }))
}

/// Credit grant request, sent by the payment collaborator after it has
/// verified the purchase.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// User to credit.
    pub user_id: String,
    /// Credits to grant. Must be positive.
    pub amount: i64,
    /// Grant kind: "purchase" (default), "refund", or "bonus".
    #[serde(default)]
    pub kind: Option<String>,
    /// Caller-supplied idempotency key (e.g. the payment ID).
    pub idempotency_key: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Credit grant response.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    /// Balance after the grant (or the already-applied balance).
    pub balance: i64,
    /// Whether this idempotency key had already been applied.
    pub duplicate: bool,
}

/// Grant credits, exactly once per idempotency key.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;

    if body.amount <= 0 {
        return Err(ApiError::BadRequest("Grant amount must be positive".into()));
    }

    let kind = match body.kind.as_deref() {
        None | Some("purchase") => TransactionKind::Purchase,
        Some("refund") => TransactionKind::Refund,
        Some("bonus") => TransactionKind::Bonus,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("Unknown grant kind: {other}")));
        }
    };

    let description = body
        .description
        .unwrap_or_else(|| format!("{} credit(s) granted via {}", body.amount, auth.service_name));

    let outcome = state.ledger.grant(
        &user_id,
        body.amount,
        kind,
        &body.idempotency_key,
        &description,
    )?;

    Ok(Json(GrantResponse {
        balance: outcome.balance,
        duplicate: outcome.duplicate,
    }))
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum rows to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction row response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Credits involved (always positive; kind determines direction).
    pub amount: i64,
    /// Tool involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Reservation this row belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            kind: tx.kind,
            amount: tx.amount,
            tool: tx.tool.map(|t| t.to_string()),
            reservation_id: tx.reservation_id.map(|r| r.to_string()),
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// History list response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more rows past this page.
    pub has_more: bool,
}

fn history_page(rows: Vec<CreditTransaction>, limit: usize) -> HistoryResponse {
    let has_more = rows.len() > limit;
    let transactions = rows
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();
    HistoryResponse {
        transactions,
        has_more,
    }
}

/// List purchase history.
pub async fn list_purchases(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let limit = query.limit.min(100);

    // Fetch one extra row to detect whether the page is the last.
    let rows = state
        .ledger
        .purchase_history(&user_id, limit + 1, query.offset)?;

    Ok(Json(history_page(rows, limit)))
}

/// List usage history (confirmed debits plus legacy spends).
pub async fn list_usage(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let limit = query.limit.min(100);

    let rows = state
        .ledger
        .usage_history(&user_id, limit + 1, query.offset)?;

    Ok(Json(history_page(rows, limit)))
}

/// Per-tool usage totals response.
#[derive(Debug, Serialize)]
pub struct UsageTotalsResponse {
    /// Totals per tool, in stable tool order.
    pub totals: Vec<ToolUsage>,
}

/// Per-tool usage totals.
pub async fn usage_totals(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<UsageTotalsResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let totals = state.ledger.usage_totals(&user_id)?;

    Ok(Json(UsageTotalsResponse { totals }))
}
