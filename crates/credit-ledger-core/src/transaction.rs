//! Ledger transaction types.
//!
//! Every balance-affecting event and every reservation lifecycle step appends
//! a transaction row. Rows are immutable once written, with one exception:
//! the `status` field of a reserve row transitions `pending` to `confirmed`
//! or `reverted` exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ReservationId, Tool, TransactionId, UserId};

/// A ledger transaction row.
///
/// For a given reservation, at most one `confirm` and at most one `revert`
/// row may ever exist, and they are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose ledger this row belongs to.
    pub user_id: UserId,

    /// What kind of ledger event this row records.
    pub kind: TransactionKind,

    /// Credits involved. Always positive; the kind determines direction.
    pub amount: i64,

    /// The tool involved, absent for purchase/bonus/refund rows.
    pub tool: Option<Tool>,

    /// Links the reserve/confirm/revert triple together.
    pub reservation_id: Option<ReservationId>,

    /// Reservation state, present on reserve rows only.
    pub status: Option<ReservationStatus>,

    /// Human-readable description.
    pub description: String,

    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a credit-granting row (`purchase`, `bonus`, or `refund`).
    ///
    /// # Panics
    ///
    /// Debug-asserts that `kind` is a granting kind.
    #[must_use]
    pub fn grant(user_id: UserId, kind: TransactionKind, amount: i64, description: String) -> Self {
        debug_assert!(kind.is_credit());
        Self {
            id: TransactionId::generate(),
            user_id,
            kind,
            amount,
            tool: None,
            reservation_id: None,
            status: None,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a `reserve` row in the `pending` state.
    #[must_use]
    pub fn reserve(
        user_id: UserId,
        tool: Tool,
        amount: i64,
        reservation_id: ReservationId,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Reserve,
            amount,
            tool: Some(tool),
            reservation_id: Some(reservation_id),
            status: Some(ReservationStatus::Pending),
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a `confirm` row for a reservation.
    #[must_use]
    pub fn confirm(
        user_id: UserId,
        tool: Option<Tool>,
        amount: i64,
        reservation_id: ReservationId,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Confirm,
            amount,
            tool,
            reservation_id: Some(reservation_id),
            status: None,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a `revert` row for a reservation, carrying the reason.
    #[must_use]
    pub fn revert(
        user_id: UserId,
        tool: Option<Tool>,
        amount: i64,
        reservation_id: ReservationId,
        reason: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Revert,
            amount,
            tool,
            reservation_id: Some(reservation_id),
            status: None,
            description: reason,
            created_at: Utc::now(),
        }
    }

    /// Whether this row is a usage row (a confirmed debit or a legacy spend).
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self.kind, TransactionKind::Confirm | TransactionKind::Spend)
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits purchased through the payment collaborator.
    Purchase,

    /// Promotional or welcome credits.
    Bonus,

    /// Credits returned by the payment collaborator.
    Refund,

    /// A pending hold on the intent to spend; no balance change.
    Reserve,

    /// A reservation confirmed; the balance decrement.
    Confirm,

    /// A reservation closed without charge.
    Revert,

    /// Legacy direct debit from before the reservation protocol. Read-only:
    /// nothing writes these rows anymore, but old ledgers contain them.
    Spend,
}

impl TransactionKind {
    /// Whether this kind adds credits to the balance.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Purchase | Self::Bonus | Self::Refund)
    }

    /// Whether this kind removes credits from the balance.
    #[must_use]
    pub const fn is_debit(self) -> bool {
        matches!(self, Self::Confirm | Self::Spend)
    }
}

/// State of a reservation.
///
/// `Pending` is the only non-terminal state; a reservation transitions out of
/// it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Reserved, awaiting confirm or revert.
    Pending,

    /// Confirmed; the balance was charged.
    Confirmed,

    /// Reverted; the balance was never charged.
    Reverted,
}

impl ReservationStatus {
    /// Whether the reservation can still be confirmed or reverted.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}
