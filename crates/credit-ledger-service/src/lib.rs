//! Credit Ledger Service - HTTP API for credit accounts and the two-phase
//! reservation protocol.
//!
//! Every paid tool debits a per-user credit balance, but the debit must not
//! happen until the downstream paid action (an external, possibly slow or
//! failing API call) succeeds. Callers therefore reserve credits first,
//! perform their side-effecting work, and then confirm (the only operation
//! that decrements the balance) or revert. A background sweeper force-reverts
//! reservations abandoned past a TTL.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use events::{BalanceChange, BalanceEvent, BalanceEvents, BalanceSubscription};
pub use ledger::{Ledger, SweepReport, ToolUsage};
pub use routes::create_router;
pub use state::AppState;
