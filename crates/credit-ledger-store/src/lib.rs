//! `RocksDB` storage layer for the credit ledger.
//!
//! This crate provides persistent storage for credit accounts and the
//! append-only transaction log, using `RocksDB` with column families for
//! indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by `user_id`
//! - `transactions`: Ledger transactions, keyed by `transaction_id` (ULID)
//! - `transactions_by_user`: Index for listing transactions by user
//! - `reservations`: Reservation ID to reserve-row lookup
//! - `pending_reservations`: Time-ordered index of open reservations
//! - `grants`: Applied grant idempotency keys
//!
//! # Atomicity contract
//!
//! All multi-step mutations (`get_or_create_account`, `grant_credits`,
//! `create_reservation`, `confirm_reservation`, `revert_reservation`) are
//! read-modify-write operations that observe a consistent snapshot and
//! commit in a single atomic write. This contract, not any in-process
//! locking by callers, is what makes concurrent reserve/confirm/revert
//! traffic on the same account safe. Implementations may realize it with
//! serialized writers (as [`RocksStore`] does) or with optimistic
//! transactions that surface [`StoreError::Contention`] on conflict.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    CreditAccount, CreditTransaction, ReservationId, Tool, TransactionId, TransactionKind, UserId,
};

/// Outcome of a reservation attempt.
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    /// Whether the reservation was granted.
    pub granted: bool,

    /// The new reservation's ID, if granted.
    pub reservation_id: Option<ReservationId>,

    /// The balance at decision time. Unchanged by the reservation itself.
    pub balance: i64,
}

/// Outcome of a credit grant.
#[derive(Debug, Clone)]
pub struct GrantOutcome {
    /// The balance after the grant (or the already-applied balance when
    /// the grant was a duplicate).
    pub balance: i64,

    /// Whether the idempotency key had already been applied. Duplicates are
    /// a no-op, not an error.
    pub duplicate: bool,
}

/// The storage trait defining all ledger database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>>;

    /// Get an account, creating it with the welcome grant if absent.
    ///
    /// Returns the account and whether it was created by this call. Creation
    /// is atomic create-if-absent: two concurrent first accesses grant the
    /// welcome bonus exactly once. When `welcome_credits` is positive the
    /// creation also appends a `bonus` transaction row for audit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_or_create_account(
        &self,
        user_id: &UserId,
        welcome_credits: i64,
    ) -> Result<(CreditAccount, bool)>;

    /// Grant credits to an account, exactly once per idempotency key.
    ///
    /// Atomically increments `credits` and `total_earned` and appends a
    /// transaction row of the given granting `kind`. A second call with the
    /// same `idempotency_key` applies nothing and returns the current
    /// balance with `duplicate = true`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AccountNotFound`] if the account doesn't exist.
    fn grant_credits(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        idempotency_key: &str,
        description: &str,
    ) -> Result<GrantOutcome>;

    // =========================================================================
    // Reservation Operations
    // =========================================================================

    /// Reserve credits for a tool without decrementing the balance.
    ///
    /// If the balance covers `cost`, appends a `reserve` row with
    /// `status = pending` and indexes it as open; otherwise returns
    /// `granted = false` without any ledger write. The balance itself is
    /// only authoritative at confirm time.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AccountNotFound`] if the account doesn't exist.
    fn create_reservation(
        &self,
        user_id: &UserId,
        tool: Tool,
        cost: i64,
        description: &str,
    ) -> Result<ReserveOutcome>;

    /// Confirm a pending reservation, decrementing the balance.
    ///
    /// Atomically re-checks that the reservation is pending, owned by
    /// `user_id`, and that the balance covers the reserved cost; then
    /// decrements `credits`, increments `total_spent`, flips the reserve row
    /// to `confirmed`, and appends a `confirm` row. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ReservationNotFound`] if unknown or owned by another
    ///   user.
    /// - [`StoreError::ReservationClosed`] if already confirmed or reverted
    ///   (a second confirm never double-charges).
    /// - [`StoreError::InsufficientCredits`] if the balance no longer covers
    ///   the cost; the reservation stays pending.
    fn confirm_reservation(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        description: &str,
    ) -> Result<i64>;

    /// Revert a pending reservation without any balance change.
    ///
    /// Atomically re-checks that the reservation is pending and owned by
    /// `user_id`, flips the reserve row to `reverted`, and appends a
    /// `revert` row carrying `reason`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ReservationNotFound`] if unknown or owned by another
    ///   user.
    /// - [`StoreError::ReservationClosed`] if already confirmed or reverted.
    fn revert_reservation(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        reason: &str,
    ) -> Result<()>;

    /// Get the reserve row for a reservation ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_reservation(&self, reservation_id: &ReservationId)
        -> Result<Option<CreditTransaction>>;

    /// List pending reservations created before `cutoff`, oldest first.
    ///
    /// Feeds the expiration sweeper. Rows already confirmed or reverted are
    /// excluded by construction (they leave the pending index when they
    /// close), but callers must still tolerate losing the race to a
    /// concurrent confirm: `revert_reservation` re-validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Transaction Log Queries
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// List transactions for a user, newest first, optionally filtered by
    /// kind, paginated by `limit`/`offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        user_id: &UserId,
        kinds: Option<&[TransactionKind]>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;
}
