//! Request and response types for the credit-ledger client.

use serde::{Deserialize, Serialize};

pub use credit_ledger_core::Tool;

/// Account response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    /// The user ID.
    pub user_id: String,
    /// Current spendable balance.
    pub credits: i64,
    /// Lifetime credits granted.
    pub total_earned: i64,
    /// Lifetime credits consumed.
    pub total_spent: i64,
    /// Account creation time (RFC 3339).
    pub created_at: String,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Current spendable balance.
    pub credits: i64,
}

/// Reservation request.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveRequest {
    /// User reserving credits.
    pub user_id: String,
    /// Tool the credits are for.
    pub tool: Tool,
}

/// Reservation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveResponse {
    /// Whether the reservation was granted. `false` means insufficient
    /// credits; the caller should prompt a purchase instead of running the
    /// paid action.
    pub granted: bool,
    /// The reservation ID to confirm or revert later, if granted.
    pub reservation_id: Option<String>,
    /// The balance at decision time.
    pub credits: i64,
}

/// Reservation state.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationResponse {
    /// The reservation ID.
    pub reservation_id: String,
    /// Tool the credits were reserved for.
    pub tool: Option<String>,
    /// Credits the confirm would charge.
    pub cost: i64,
    /// Current status: "pending", "confirmed", or "reverted".
    pub status: Option<String>,
    /// When the reservation was made (RFC 3339).
    pub created_at: String,
}

/// Confirm request.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmRequest {
    /// The reserving user.
    pub user_id: String,
    /// Description recorded on the charge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Confirm response.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmResponse {
    /// Always true on the success path.
    pub success: bool,
    /// Balance after the charge.
    pub remaining_credits: i64,
}

/// Revert request.
#[derive(Debug, Clone, Serialize)]
pub struct RevertRequest {
    /// The reserving user.
    pub user_id: String,
    /// Why the reservation is being closed without charge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Revert response.
#[derive(Debug, Clone, Deserialize)]
pub struct RevertResponse {
    /// Always true on the success path.
    pub success: bool,
}

/// Credit grant request.
#[derive(Debug, Clone, Serialize)]
pub struct GrantRequest {
    /// User to credit.
    pub user_id: String,
    /// Credits to grant. Must be positive.
    pub amount: i64,
    /// Grant kind: "purchase" (default), "refund", or "bonus".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Caller-supplied idempotency key (e.g. the payment ID).
    pub idempotency_key: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Credit grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    /// Balance after the grant.
    pub balance: i64,
    /// Whether this idempotency key had already been applied.
    pub duplicate: bool,
}

/// Transaction row.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Transaction kind.
    pub kind: String,
    /// Credits involved (always positive; kind determines direction).
    pub amount: i64,
    /// Tool involved, if any.
    pub tool: Option<String>,
    /// Reservation this row belongs to, if any.
    pub reservation_id: Option<String>,
    /// Description.
    pub description: String,
    /// Timestamp (RFC 3339).
    pub created_at: String,
}

/// History list response.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    /// Transactions, newest first.
    pub transactions: Vec<TransactionResponse>,
    /// Whether more rows exist past this page.
    pub has_more: bool,
}

/// Per-tool usage totals row.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolUsageResponse {
    /// The tool.
    pub tool: Tool,
    /// Confirmed uses.
    pub uses: u64,
    /// Credits consumed across those uses.
    pub credits: i64,
}

/// Usage totals response.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageTotalsResponse {
    /// Totals per tool, in stable tool order.
    pub totals: Vec<ToolUsageResponse>,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
