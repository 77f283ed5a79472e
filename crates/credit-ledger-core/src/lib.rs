//! Core types for the credit ledger service.
//!
//! This crate provides the foundational types used throughout the credit
//! ledger:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `ReservationId`
//! - **Accounts**: `CreditAccount`
//! - **Transactions**: `CreditTransaction`, `TransactionKind`, `ReservationStatus`
//! - **Tools**: `Tool` and its static cost table
//!
//! # Credits and reservations
//!
//! A credit is the unit of entitlement consumed per use of a paid tool.
//! Spending follows a two-phase protocol: a *reservation* records the intent
//! to spend before the external paid action runs, and only a *confirm*
//! actually decrements the balance, after the action succeeds. A *revert*
//! closes the reservation without touching the balance. Balances are stored
//! as `i64` whole credits and are never negative.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod ids;
pub mod tool;
pub mod transaction;

pub use account::CreditAccount;
pub use ids::{IdError, ReservationId, TransactionId, UserId};
pub use tool::{Tool, UnknownTool};
pub use transaction::{CreditTransaction, ReservationStatus, TransactionKind};
