//! The account ledger and reservation manager.
//!
//! [`Ledger`] owns every ledger operation: account lifecycle with the
//! welcome grant, the reserve/confirm/revert state machine, exactly-once
//! credit grants, history projections, and the expiration sweep. It is an
//! explicitly constructed instance holding a store reference - callers get
//! it injected rather than importing a singleton.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use credit_ledger_core::{
    CreditAccount, CreditTransaction, ReservationId, Tool, TransactionKind, UserId,
};
use credit_ledger_store::{GrantOutcome, ReserveOutcome, Result, Store, StoreError};

use crate::events::{BalanceChange, BalanceEvent, BalanceEvents};

/// Bounded retries for transient store contention before surfacing failure.
const CONTENTION_RETRIES: u32 = 3;

/// Page size used when the ledger walks a user's full usage log internally.
const SCAN_PAGE_SIZE: usize = 256;

/// Per-tool usage totals.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolUsage {
    /// The tool.
    pub tool: Tool,

    /// Confirmed uses.
    pub uses: u64,

    /// Credits consumed across those uses.
    pub credits: i64,
}

/// Result of one expiration sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    /// Expired pending reservations found.
    pub scanned: usize,

    /// Reservations force-reverted.
    pub reverted: usize,

    /// Reservations that closed concurrently and were skipped.
    pub skipped: usize,
}

/// The credit ledger service.
pub struct Ledger {
    store: Arc<dyn Store>,
    welcome_credits: i64,
    reservation_ttl: chrono::Duration,
    events: BalanceEvents,
}

impl Ledger {
    /// Create a new ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, welcome_credits: i64, reservation_ttl_seconds: u64) -> Self {
        Self {
            store,
            welcome_credits,
            reservation_ttl: chrono::Duration::seconds(
                i64::try_from(reservation_ttl_seconds).unwrap_or(3600),
            ),
            events: BalanceEvents::new(),
        }
    }

    /// The balance-change event hub.
    #[must_use]
    pub fn events(&self) -> &BalanceEvents {
        &self.events
    }

    // =========================================================================
    // Account Ledger
    // =========================================================================

    /// Get the user's account, creating it with the welcome grant on first
    /// access.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn account(&self, user_id: &UserId) -> Result<CreditAccount> {
        let (account, created) =
            with_retries(|| self.store.get_or_create_account(user_id, self.welcome_credits))?;

        if created {
            tracing::info!(
                user_id = %user_id,
                welcome_credits = self.welcome_credits,
                "account created with welcome grant"
            );
            self.events.publish(BalanceEvent {
                user_id: *user_id,
                balance: account.credits,
                change: BalanceChange::Welcome,
            });
        }

        Ok(account)
    }

    /// Current spendable balance, creating the account if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(self.account(user_id)?.credits)
    }

    /// Grant credits, exactly once per idempotency key.
    ///
    /// Called by the payment collaborator after it independently verifies a
    /// completed purchase; the ledger does not validate payments, only
    /// applies the grant. A repeated key is a no-op returning the
    /// already-applied balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn grant(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        idempotency_key: &str,
        description: &str,
    ) -> Result<GrantOutcome> {
        // First access through the grant path still earns the welcome bonus.
        self.account(user_id)?;

        let outcome = with_retries(|| {
            self.store
                .grant_credits(user_id, amount, kind, idempotency_key, description)
        })?;

        if outcome.duplicate {
            tracing::warn!(
                user_id = %user_id,
                idempotency_key,
                "duplicate grant ignored"
            );
        } else {
            tracing::info!(
                user_id = %user_id,
                amount,
                kind = ?kind,
                idempotency_key,
                balance = outcome.balance,
                "credits granted"
            );
            self.events.publish(BalanceEvent {
                user_id: *user_id,
                balance: outcome.balance,
                change: BalanceChange::Grant,
            });
        }

        Ok(outcome)
    }

    // =========================================================================
    // Reservation Manager
    // =========================================================================

    /// Reserve credits for a tool.
    ///
    /// Reservations are optimistic: granting one never decrements the
    /// balance, and the sufficiency check here is advisory. Concurrently
    /// granted reservations can collectively exceed the balance; only
    /// [`Ledger::confirm`] is authoritative, so the excess ones later fail
    /// to confirm with insufficient credits. This is deliberate - paid
    /// actions confirm promptly and users rarely run many in parallel - and
    /// it keeps reserve cheap and free of lock-the-funds bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn reserve(&self, user_id: &UserId, tool: Tool) -> Result<ReserveOutcome> {
        self.account(user_id)?;

        let cost = tool.cost();
        let description = format!("Reserved {cost} credit(s) for {tool}");
        let outcome =
            with_retries(|| self.store.create_reservation(user_id, tool, cost, &description))?;

        if outcome.granted {
            tracing::info!(
                user_id = %user_id,
                tool = %tool,
                cost,
                reservation_id = ?outcome.reservation_id,
                "reservation granted"
            );
        } else {
            tracing::info!(
                user_id = %user_id,
                tool = %tool,
                cost,
                balance = outcome.balance,
                "reservation declined, insufficient credits"
            );
        }

        Ok(outcome)
    }

    /// Confirm a reservation - the only operation that decrements the
    /// balance. Returns the remaining credits.
    ///
    /// Idempotent: a second confirm fails with `ReservationClosed` and does
    /// not charge again. If the balance no longer covers the cost the
    /// reservation stays pending, eligible for retry or sweeping.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ReservationNotFound`] for unknown or foreign IDs.
    /// - [`StoreError::ReservationClosed`] if already terminal.
    /// - [`StoreError::InsufficientCredits`] if the re-check fails.
    pub fn confirm(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        description: Option<&str>,
    ) -> Result<i64> {
        let description = description.unwrap_or("Reservation confirmed");
        let balance = with_retries(|| {
            self.store
                .confirm_reservation(user_id, reservation_id, description)
        })?;

        tracing::info!(
            user_id = %user_id,
            reservation_id = %reservation_id,
            balance,
            "reservation confirmed"
        );
        self.events.publish(BalanceEvent {
            user_id: *user_id,
            balance,
            change: BalanceChange::Spend,
        });

        Ok(balance)
    }

    /// Revert a reservation. Never changes the balance.
    ///
    /// Idempotent in the same sense as confirm: reverting a closed
    /// reservation fails with `ReservationClosed` and corrupts nothing.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ReservationNotFound`] for unknown or foreign IDs.
    /// - [`StoreError::ReservationClosed`] if already terminal.
    pub fn revert(
        &self,
        user_id: &UserId,
        reservation_id: &ReservationId,
        reason: Option<&str>,
    ) -> Result<()> {
        let reason = reason.unwrap_or("Reservation reverted");
        with_retries(|| self.store.revert_reservation(user_id, reservation_id, reason))?;

        tracing::info!(
            user_id = %user_id,
            reservation_id = %reservation_id,
            reason,
            "reservation reverted"
        );

        Ok(())
    }

    // =========================================================================
    // Expiration Sweeper
    // =========================================================================

    /// Revert reservations left pending longer than the TTL.
    ///
    /// Batched and at-least-once: each revert re-validates `pending` inside
    /// the store's atomic operation, so racing a concurrent confirm (or a
    /// second sweeper) loses harmlessly and is counted as skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the expired-reservation scan fails; individual
    /// revert races are absorbed into the report.
    pub fn sweep_expired(&self, now: DateTime<Utc>, batch_size: usize) -> Result<SweepReport> {
        let cutoff = now - self.reservation_ttl;
        let expired = self.store.list_expired_pending(cutoff, batch_size)?;

        let mut report = SweepReport {
            scanned: expired.len(),
            ..SweepReport::default()
        };

        for row in expired {
            let Some(reservation_id) = row.reservation_id else {
                continue;
            };

            match self
                .store
                .revert_reservation(&row.user_id, &reservation_id, "expired")
            {
                Ok(()) => {
                    tracing::info!(
                        user_id = %row.user_id,
                        reservation_id = %reservation_id,
                        created_at = %row.created_at,
                        "expired reservation reverted"
                    );
                    report.reverted += 1;
                }
                Err(
                    StoreError::ReservationClosed { .. } | StoreError::ReservationNotFound { .. },
                ) => {
                    // Lost the race to the original caller. Exactly the
                    // outcome the conditional transition exists for.
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Query / History
    // =========================================================================

    /// Paginated purchase history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn purchase_history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        self.store
            .list_transactions(user_id, Some(&[TransactionKind::Purchase]), limit, offset)
    }

    /// Paginated usage history (confirmed debits plus legacy spends),
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn usage_history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        self.store.list_transactions(
            user_id,
            Some(&[TransactionKind::Confirm, TransactionKind::Spend]),
            limit,
            offset,
        )
    }

    /// Per-tool usage totals across the whole log.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn usage_totals(&self, user_id: &UserId) -> Result<Vec<ToolUsage>> {
        let mut totals: HashMap<Tool, ToolUsage> = HashMap::new();
        let mut offset = 0;

        loop {
            let page = self.usage_history(user_id, SCAN_PAGE_SIZE, offset)?;
            let page_len = page.len();

            for row in page {
                let Some(tool) = row.tool else { continue };
                let entry = totals.entry(tool).or_insert(ToolUsage {
                    tool,
                    uses: 0,
                    credits: 0,
                });
                entry.uses += 1;
                entry.credits += row.amount;
            }

            if page_len < SCAN_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        let mut totals: Vec<_> = totals.into_values().collect();
        totals.sort_by_key(|t| t.tool.as_str());
        Ok(totals)
    }

    /// Look up a reservation's reserve row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    pub fn reservation(&self, reservation_id: &ReservationId) -> Result<Option<CreditTransaction>> {
        self.store.get_reservation(reservation_id)
    }
}

/// Retry transient contention a bounded number of times, then surface it.
/// Never retries non-transient errors: ambiguity must reach the caller
/// rather than risk a duplicate side effect.
fn with_retries<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < CONTENTION_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, "retrying after store contention");
            }
            other => return other,
        }
    }
}
