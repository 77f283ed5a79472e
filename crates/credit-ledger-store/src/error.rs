//! Error types for ledger storage.

use credit_ledger_core::ReservationStatus;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Account not found.
    #[error("account not found: {user_id}")]
    AccountNotFound {
        /// The user whose account is missing.
        user_id: String,
    },

    /// Reservation not found (or not owned by the requesting user).
    #[error("reservation not found: {reservation_id}")]
    ReservationNotFound {
        /// The reservation ID that was not found.
        reservation_id: String,
    },

    /// Reservation already confirmed or reverted.
    #[error("reservation {reservation_id} already closed: {status:?}")]
    ReservationClosed {
        /// The reservation ID.
        reservation_id: String,
        /// The terminal status it is in.
        status: ReservationStatus,
    },

    /// Insufficient credits for a confirm or legacy debit.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance in credits.
        balance: i64,
        /// Required amount in credits.
        required: i64,
    },

    /// Transient optimistic-concurrency conflict. The operation left no
    /// trace and may be retried. Raised by compare-and-swap backends; the
    /// serialized-writer RocksDB backend never produces it.
    #[error("store contention, retry")]
    Contention,
}

impl StoreError {
    /// Whether the error is transient and the operation safe to retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Contention)
    }
}
