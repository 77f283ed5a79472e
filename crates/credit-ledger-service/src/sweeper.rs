//! Background expiration sweeper.
//!
//! Reverts reservations nobody closed: a caller that crashed between
//! reserve and confirm/revert leaves a pending row behind, and this task is
//! the backstop that eventually closes it. It only ever reverts, so it can
//! never cause a double charge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::ledger::Ledger;

/// Spawn the periodic sweep task.
///
/// Runs off the request path on its own interval; each tick reverts at most
/// `batch_size` expired reservations, leaving the rest for the next tick.
pub fn spawn(ledger: Arc<Ledger>, interval: Duration, batch_size: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup isn't a sweep.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match ledger.sweep_expired(Utc::now(), batch_size) {
                Ok(report) if report.scanned > 0 => {
                    tracing::info!(
                        scanned = report.scanned,
                        reverted = report.reverted,
                        skipped = report.skipped,
                        "expiration sweep complete"
                    );
                }
                Ok(_) => {
                    tracing::debug!("expiration sweep found nothing to revert");
                }
                Err(e) => {
                    // Leave the rows for the next tick; sweeping is
                    // at-least-once.
                    tracing::error!(error = %e, "expiration sweep failed");
                }
            }
        }
    })
}
