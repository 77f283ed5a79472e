//! Credit Ledger Client SDK.
//!
//! This crate provides a client library for backend services to interact
//! with the credit-ledger API: reserving credits before a paid tool runs,
//! confirming or reverting afterwards, and granting purchased credits.
//!
//! # Example
//!
//! ```no_run
//! use credit_ledger_client::{CreditLedgerClient, Tool};
//!
//! # async fn example() -> Result<(), credit_ledger_client::ClientError> {
//! let client = CreditLedgerClient::new(
//!     "http://credit-ledger.tools.svc:8080",
//!     "your-service-api-key",
//! );
//!
//! // Reserve before running the paid action
//! let reservation = client.reserve("user-uuid", Tool::CvReview).await?;
//! let Some(reservation_id) = reservation.reservation_id else {
//!     return Ok(()); // insufficient credits, prompt a purchase
//! };
//!
//! // ... run the external paid action ...
//!
//! let outcome = client.confirm("user-uuid", &reservation_id, None).await?;
//! println!("Remaining credits: {}", outcome.remaining_credits);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, CreditLedgerClient};
pub use error::ClientError;
pub use types::*;
