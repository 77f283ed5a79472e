//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Reservation lookup, keyed by `reservation_id`, value is the
    /// transaction ID of the reserve row.
    pub const RESERVATIONS: &str = "reservations";

    /// Pending reservations awaiting confirm/revert, keyed by
    /// `reservation_id` (ULID, so naturally oldest-first for the sweeper),
    /// value is the transaction ID of the reserve row.
    pub const PENDING_RESERVATIONS: &str = "pending_reservations";

    /// Applied grant idempotency keys, keyed by the caller-supplied key
    /// (e.g. a payment ID), value is the transaction ID of the grant row.
    pub const GRANTS: &str = "grants";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::RESERVATIONS,
        cf::PENDING_RESERVATIONS,
        cf::GRANTS,
    ]
}
