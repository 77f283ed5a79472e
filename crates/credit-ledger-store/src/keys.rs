//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use credit_ledger_core::{ReservationId, TransactionId, UserId};

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, transactions for a user sort by time.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create the exclusive upper bound of a user's transaction index range.
///
/// Seeking here with a reverse iterator lands on the user's newest
/// transaction without touching any other user's keys.
#[must_use]
pub fn user_transactions_upper_bound(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&[0xFF; 16]);
    key
}

/// Extract the transaction ID from a user-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a reservation key from a reservation ID.
///
/// Used for both the reservation-lookup and the pending-reservation column
/// families; in the latter the ULID time-ordering makes iteration
/// oldest-first.
#[must_use]
pub fn reservation_key(reservation_id: &ReservationId) -> Vec<u8> {
    reservation_id.to_bytes().to_vec()
}

/// Decode a transaction ID stored as a column family value.
///
/// # Panics
///
/// Panics if the value is not exactly 16 bytes.
#[must_use]
pub fn transaction_id_from_value(value: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&value[..16]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a grant idempotency key.
#[must_use]
pub fn grant_key(idempotency_key: &str) -> Vec<u8> {
    idempotency_key.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_length() {
        let user_id = UserId::generate();
        let key = account_key(&user_id);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn user_transaction_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
    }

    #[test]
    fn extract_transaction_id_roundtrip() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        let extracted = extract_transaction_id_from_user_key(&key);
        assert_eq!(extracted, tx_id);
    }

    #[test]
    fn transaction_id_value_roundtrip() {
        let tx_id = TransactionId::generate();
        let value = transaction_key(&tx_id);
        assert_eq!(transaction_id_from_value(&value), tx_id);
    }

    #[test]
    fn reservation_keys_sort_by_creation_time() {
        let a = ReservationId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = ReservationId::generate();
        assert!(reservation_key(&a) < reservation_key(&b));
    }
}
