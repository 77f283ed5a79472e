//! Balance-change event subscription.
//!
//! A near-real-time convenience channel for UI responsiveness: every balance
//! establishment or change publishes a [`BalanceEvent`], and subscribers get
//! a per-user filtered stream. Dropping the subscription unsubscribes. Not
//! required for correctness; the ledger never waits on subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

use credit_ledger_core::UserId;

/// Buffered events per subscriber before slow consumers start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceChange {
    /// Current balance at subscription time, sent before any live events.
    Snapshot,

    /// Account created with the welcome grant.
    Welcome,

    /// Credits granted (purchase, refund, or bonus).
    Grant,

    /// A reservation was confirmed and charged.
    Spend,
}

/// A balance-change notification.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceEvent {
    /// The affected user.
    pub user_id: UserId,

    /// The balance after the change.
    pub balance: i64,

    /// What caused the change.
    pub change: BalanceChange,
}

/// Broadcast hub for balance events.
#[derive(Debug, Clone)]
pub struct BalanceEvents {
    tx: broadcast::Sender<BalanceEvent>,
}

impl BalanceEvents {
    /// Create a new event hub.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a balance event. Fire-and-forget: having no subscribers is
    /// not an error.
    pub fn publish(&self, event: BalanceEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("balance event dropped, no subscribers");
        }
    }

    /// Subscribe to balance changes for one user.
    #[must_use]
    pub fn subscribe(&self, user_id: UserId) -> BalanceSubscription {
        BalanceSubscription {
            rx: self.tx.subscribe(),
            user_id,
        }
    }
}

impl Default for BalanceEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A per-user subscription to balance changes.
///
/// Drop it to unsubscribe.
pub struct BalanceSubscription {
    rx: broadcast::Receiver<BalanceEvent>,
    user_id: UserId,
}

impl BalanceSubscription {
    /// Wait for the next balance change for the subscribed user.
    ///
    /// Returns `None` once the hub is gone. A subscriber that falls behind
    /// loses the oldest buffered events and keeps going; balance events are
    /// snapshots, so the latest one is the one that matters.
    pub async fn next(&mut self) -> Option<BalanceEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(user_id = %self.user_id, skipped, "balance subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_only_its_user() {
        let hub = BalanceEvents::new();
        let user = UserId::generate();
        let other = UserId::generate();

        let mut sub = hub.subscribe(user);

        hub.publish(BalanceEvent {
            user_id: other,
            balance: 7,
            change: BalanceChange::Grant,
        });
        hub.publish(BalanceEvent {
            user_id: user,
            balance: 3,
            change: BalanceChange::Spend,
        });

        let event = sub.next().await.unwrap();
        assert_eq!(event.user_id, user);
        assert_eq!(event.balance, 3);
        assert_eq!(event.change, BalanceChange::Spend);
    }

    #[tokio::test]
    async fn subscription_ends_when_hub_dropped() {
        let hub = BalanceEvents::new();
        let mut sub = hub.subscribe(UserId::generate());
        drop(hub);

        assert!(sub.next().await.is_none());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let hub = BalanceEvents::new();
        hub.publish(BalanceEvent {
            user_id: UserId::generate(),
            balance: 1,
            change: BalanceChange::Welcome,
        });
    }
}
