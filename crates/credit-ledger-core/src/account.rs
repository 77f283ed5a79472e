//! Credit account types.
//!
//! This module defines the per-user credit account aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A credit account for a user.
///
/// The account tracks the spendable balance and lifetime totals. The balance
/// is only ever decremented by confirming a reservation, never by the
/// reservation itself, and is never negative. Accounts are created lazily on
/// first access with a one-time welcome grant and are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    /// The user who owns the account.
    pub user_id: UserId,

    /// Current spendable balance in credits. Never negative.
    pub credits: i64,

    /// Lifetime credits granted (welcome bonus + purchases + refunds).
    pub total_earned: i64,

    /// Lifetime credits confirmed as consumed.
    pub total_spent: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account carrying its one-time welcome grant.
    #[must_use]
    pub fn new_with_welcome(user_id: UserId, welcome_credits: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            credits: welcome_credits,
            total_earned: welcome_credits,
            total_spent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the account can cover a debit of `cost` credits.
    #[must_use]
    pub const fn has_sufficient_credits(&self, cost: i64) -> bool {
        self.credits >= cost
    }
}
