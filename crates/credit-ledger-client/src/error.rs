//! Client error types.

/// Errors that can occur when using the credit-ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits to confirm the reservation.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The reservation was already confirmed or reverted.
    #[error("reservation {reservation_id} already closed ({status})")]
    ReservationClosed {
        /// The reservation ID.
        reservation_id: String,
        /// The terminal status it is in.
        status: String,
    },

    /// Account or reservation not found.
    #[error("not found: {message}")]
    NotFound {
        /// The server's description of what was missing.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the error means the user should be prompted to buy credits.
    #[must_use]
    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, Self::InsufficientCredits { .. })
    }
}
