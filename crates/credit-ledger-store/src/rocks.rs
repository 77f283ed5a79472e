//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use credit_ledger_core::{
    CreditAccount, CreditTransaction, ReservationId, ReservationStatus, Tool, TransactionId,
    TransactionKind, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{GrantOutcome, ReserveOutcome, Store};

/// `RocksDB`-backed storage implementation.
///
/// Compound mutations serialize through an internal write lock so that the
/// read-decide-write of each operation is a single atomic step; the batch
/// commit then makes it durable all-or-nothing. Plain reads take no lock.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Stage a transaction row and its user index entry into `batch`.
    fn stage_transaction(&self, batch: &mut WriteBatch, tx: &CreditTransaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let value = Self::serialize(tx)?;
        batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), &value);
        batch.put_cf(
            &cf_by_user,
            keys::user_transaction_key(&tx.user_id, &tx.id),
            [],
        );
        Ok(())
    }

    /// Load the reserve row for a reservation, validating ownership.
    ///
    /// Ownership mismatches report `ReservationNotFound` rather than leaking
    /// that the ID exists under another user.
    fn load_owned_reservation(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
    ) -> Result<CreditTransaction> {
        let row = self.get_reservation(reservation_id)?.ok_or_else(|| {
            StoreError::ReservationNotFound {
                reservation_id: reservation_id.to_string(),
            }
        })?;

        if row.user_id != *user_id {
            return Err(StoreError::ReservationNotFound {
                reservation_id: reservation_id.to_string(),
            });
        }

        Ok(row)
    }

    fn require_account(&self, user_id: &UserId) -> Result<CreditAccount> {
        self.get_account(user_id)?
            .ok_or_else(|| StoreError::AccountNotFound {
                user_id: user_id.to_string(),
            })
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_or_create_account(
        &self,
        user_id: &UserId,
        welcome_credits: i64,
    ) -> Result<(CreditAccount, bool)> {
        let _guard = self.lock_writes()?;

        // Re-check under the lock: a concurrent first access must not grant
        // the welcome bonus twice.
        if let Some(account) = self.get_account(user_id)? {
            return Ok((account, false));
        }

        let account = CreditAccount::new_with_welcome(*user_id, welcome_credits);

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_accounts,
            keys::account_key(user_id),
            Self::serialize(&account)?,
        );

        if welcome_credits > 0 {
            let tx = CreditTransaction::grant(
                *user_id,
                TransactionKind::Bonus,
                welcome_credits,
                "Welcome credits".into(),
            );
            self.stage_transaction(&mut batch, &tx)?;
        }

        self.write(batch)?;
        tracing::debug!(user_id = %user_id, welcome_credits, "account created");

        Ok((account, true))
    }

    fn grant_credits(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        idempotency_key: &str,
        description: &str,
    ) -> Result<GrantOutcome> {
        let _guard = self.lock_writes()?;

        let cf_grants = self.cf(cf::GRANTS)?;
        let grant_key = keys::grant_key(idempotency_key);

        let already_applied = self
            .db
            .get_cf(&cf_grants, &grant_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        if already_applied {
            let account = self.require_account(user_id)?;
            tracing::debug!(
                user_id = %user_id,
                idempotency_key,
                "duplicate grant ignored"
            );
            return Ok(GrantOutcome {
                balance: account.credits,
                duplicate: true,
            });
        }

        let mut account = self.require_account(user_id)?;
        account.credits += amount;
        account.total_earned += amount;
        account.updated_at = Utc::now();

        let tx = CreditTransaction::grant(*user_id, kind, amount, description.to_string());

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_accounts,
            keys::account_key(user_id),
            Self::serialize(&account)?,
        );
        self.stage_transaction(&mut batch, &tx)?;
        batch.put_cf(&cf_grants, &grant_key, keys::transaction_key(&tx.id));

        self.write(batch)?;

        Ok(GrantOutcome {
            balance: account.credits,
            duplicate: false,
        })
    }

    // =========================================================================
    // Reservation Operations
    // =========================================================================

    fn create_reservation(
        &self,
        user_id: &UserId,
        tool: Tool,
        cost: i64,
        description: &str,
    ) -> Result<ReserveOutcome> {
        let _guard = self.lock_writes()?;

        let account = self.require_account(user_id)?;

        if !account.has_sufficient_credits(cost) {
            return Ok(ReserveOutcome {
                granted: false,
                reservation_id: None,
                balance: account.credits,
            });
        }

        let reservation_id = ReservationId::generate();
        let tx = CreditTransaction::reserve(
            *user_id,
            tool,
            cost,
            reservation_id,
            description.to_string(),
        );

        let cf_reservations = self.cf(cf::RESERVATIONS)?;
        let cf_pending = self.cf(cf::PENDING_RESERVATIONS)?;
        let res_key = keys::reservation_key(&reservation_id);
        let tx_key = keys::transaction_key(&tx.id);

        let mut batch = WriteBatch::default();
        self.stage_transaction(&mut batch, &tx)?;
        batch.put_cf(&cf_reservations, &res_key, &tx_key);
        batch.put_cf(&cf_pending, &res_key, &tx_key);

        self.write(batch)?;

        Ok(ReserveOutcome {
            granted: true,
            reservation_id: Some(reservation_id),
            balance: account.credits,
        })
    }

    fn confirm_reservation(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        description: &str,
    ) -> Result<i64> {
        let _guard = self.lock_writes()?;

        let mut reserve_row = self.load_owned_reservation(user_id, reservation_id)?;

        match reserve_row.status {
            Some(ReservationStatus::Pending) => {}
            Some(status) => {
                return Err(StoreError::ReservationClosed {
                    reservation_id: reservation_id.to_string(),
                    status,
                })
            }
            // A reserve row always carries a status; treat a missing one as
            // an unconfirmable row rather than corrupting the balance.
            None => {
                return Err(StoreError::ReservationNotFound {
                    reservation_id: reservation_id.to_string(),
                })
            }
        }

        let cost = reserve_row.amount;
        let mut account = self.require_account(user_id)?;

        // The authoritative sufficiency check. Reserve was optimistic; a
        // competing confirm may have drained the balance since.
        if !account.has_sufficient_credits(cost) {
            return Err(StoreError::InsufficientCredits {
                balance: account.credits,
                required: cost,
            });
        }

        account.credits -= cost;
        account.total_spent += cost;
        account.updated_at = Utc::now();

        reserve_row.status = Some(ReservationStatus::Confirmed);

        let confirm_row = CreditTransaction::confirm(
            *user_id,
            reserve_row.tool,
            cost,
            *reservation_id,
            description.to_string(),
        );

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_pending = self.cf(cf::PENDING_RESERVATIONS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_accounts,
            keys::account_key(user_id),
            Self::serialize(&account)?,
        );
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&reserve_row.id),
            Self::serialize(&reserve_row)?,
        );
        self.stage_transaction(&mut batch, &confirm_row)?;
        batch.delete_cf(&cf_pending, keys::reservation_key(reservation_id));

        self.write(batch)?;

        Ok(account.credits)
    }

    fn revert_reservation(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        reason: &str,
    ) -> Result<()> {
        let _guard = self.lock_writes()?;

        let mut reserve_row = self.load_owned_reservation(user_id, reservation_id)?;

        match reserve_row.status {
            Some(ReservationStatus::Pending) => {}
            Some(status) => {
                return Err(StoreError::ReservationClosed {
                    reservation_id: reservation_id.to_string(),
                    status,
                })
            }
            None => {
                return Err(StoreError::ReservationNotFound {
                    reservation_id: reservation_id.to_string(),
                })
            }
        }

        reserve_row.status = Some(ReservationStatus::Reverted);

        let revert_row = CreditTransaction::revert(
            *user_id,
            reserve_row.tool,
            reserve_row.amount,
            *reservation_id,
            reason.to_string(),
        );

        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_pending = self.cf(cf::PENDING_RESERVATIONS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&reserve_row.id),
            Self::serialize(&reserve_row)?,
        );
        self.stage_transaction(&mut batch, &revert_row)?;
        batch.delete_cf(&cf_pending, keys::reservation_key(reservation_id));

        self.write(batch)
    }

    fn get_reservation(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<Option<CreditTransaction>> {
        let cf_reservations = self.cf(cf::RESERVATIONS)?;

        let Some(value) = self
            .db
            .get_cf(&cf_reservations, keys::reservation_key(reservation_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        self.get_transaction(&keys::transaction_id_from_value(&value))
    }

    fn list_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_pending = self.cf(cf::PENDING_RESERVATIONS)?;

        let cutoff_ms = u64::try_from(cutoff.timestamp_millis()).unwrap_or(0);

        let mut expired = Vec::new();
        for item in self.db.iterator_cf(&cf_pending, IteratorMode::Start) {
            if expired.len() >= limit {
                break;
            }

            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            let mut id_bytes = [0u8; 16];
            if key.len() != 16 {
                continue;
            }
            id_bytes.copy_from_slice(&key);
            let reservation_id = ReservationId::from_bytes(id_bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            // Keys are ULIDs, so iteration is oldest-first and everything
            // past the cutoff can be skipped in one stop.
            if reservation_id.timestamp_ms() >= cutoff_ms {
                break;
            }

            if let Some(row) = self.get_transaction(&keys::transaction_id_from_value(&value))? {
                expired.push(row);
            }
        }

        Ok(expired)
    }

    // =========================================================================
    // Transaction Log Queries
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let key = keys::transaction_key(transaction_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions(
        &self,
        user_id: &UserId,
        kinds: Option<&[TransactionKind]>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);
        let upper = keys::user_transactions_upper_bound(user_id);

        // ULIDs order the index chronologically, so walking backward from
        // the range's upper bound yields newest-first without materializing
        // the whole history.
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&upper, rocksdb::Direction::Reverse),
        );

        let mut transactions = Vec::new();
        let mut skipped = 0;

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }
            if transactions.len() >= limit {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            let Some(tx) = self.get_transaction(&tx_id)? else {
                continue;
            };

            if let Some(kinds) = kinds {
                if !kinds.contains(&tx.kind) {
                    continue;
                }
            }

            if skipped < offset {
                skipped += 1;
                continue;
            }

            transactions.push(tx);
        }

        Ok(transactions)
    }
}
