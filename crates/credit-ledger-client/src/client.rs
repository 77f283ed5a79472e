//! Credit-ledger HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    AccountResponse, ApiErrorResponse, BalanceResponse, ConfirmRequest, ConfirmResponse,
    GrantRequest, GrantResponse, HistoryResponse, ReservationResponse, ReserveRequest,
    ReserveResponse, RevertRequest, RevertResponse, Tool, UsageTotalsResponse,
};

/// Credit-ledger API client.
///
/// Provides methods for the two-phase reservation protocol, credit grants,
/// and history queries.
#[derive(Debug, Clone)]
pub struct CreditLedgerClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl CreditLedgerClient {
    /// Create a new credit-ledger client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the credit-ledger service (e.g., `"http://credit-ledger:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new credit-ledger client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Get a user's account, creating it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_account(
        &self,
        user_id: impl AsRef<str>,
    ) -> Result<AccountResponse, ClientError> {
        let url = format!("{}/v1/accounts/{}", self.base_url, user_id.as_ref());

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Get a user's current credit balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(
        &self,
        user_id: impl AsRef<str>,
    ) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/credits/{}/balance", self.base_url, user_id.as_ref());

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Reserve credits before running a paid tool.
    ///
    /// A declined reservation is not an error: the response carries
    /// `granted = false` and the caller prompts the user to purchase
    /// credits instead of running the action.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn reserve(
        &self,
        user_id: impl Into<String>,
        tool: Tool,
    ) -> Result<ReserveResponse, ClientError> {
        let url = format!("{}/v1/reservations", self.base_url);
        let request = ReserveRequest {
            user_id: user_id.into(),
            tool,
        };

        let response = self.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Look up a reservation's state.
    ///
    /// Used when recovering after a crash between reserve and confirm: the
    /// status tells the caller whether the charge already landed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for unknown or foreign IDs.
    pub async fn get_reservation(
        &self,
        user_id: impl AsRef<str>,
        reservation_id: &str,
    ) -> Result<ReservationResponse, ClientError> {
        let url = format!(
            "{}/v1/reservations/{reservation_id}?user_id={}",
            self.base_url,
            user_id.as_ref()
        );

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Confirm a reservation after the paid action succeeded. This is the
    /// call that actually charges the credits.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InsufficientCredits`] if the balance no longer
    ///   covers the cost; the reservation stays open for retry.
    /// - [`ClientError::ReservationClosed`] if already confirmed or
    ///   reverted.
    /// - [`ClientError::NotFound`] for unknown reservation IDs.
    pub async fn confirm(
        &self,
        user_id: impl Into<String>,
        reservation_id: &str,
        description: Option<String>,
    ) -> Result<ConfirmResponse, ClientError> {
        let url = format!("{}/v1/reservations/{reservation_id}/confirm", self.base_url);
        let request = ConfirmRequest {
            user_id: user_id.into(),
            description,
        };

        let response = self.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Revert a reservation after the paid action failed. Never charges.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ReservationClosed`] if already confirmed or
    ///   reverted.
    /// - [`ClientError::NotFound`] for unknown reservation IDs.
    pub async fn revert(
        &self,
        user_id: impl Into<String>,
        reservation_id: &str,
        reason: Option<String>,
    ) -> Result<RevertResponse, ClientError> {
        let url = format!("{}/v1/reservations/{reservation_id}/revert", self.base_url);
        let request = RevertRequest {
            user_id: user_id.into(),
            reason,
        };

        let response = self.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Grant credits, exactly once per idempotency key.
    ///
    /// Called after independently verifying a completed purchase. Safe to
    /// retry with the same key; the response's `duplicate` flag reports
    /// whether the grant had already been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grant_credits(&self, request: GrantRequest) -> Result<GrantResponse, ClientError> {
        let url = format!("{}/v1/credits/grant", self.base_url);

        let response = self.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// List a user's purchase history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_purchases(
        &self,
        user_id: impl AsRef<str>,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryResponse, ClientError> {
        let url = format!(
            "{}/v1/credits/{}/purchases?limit={limit}&offset={offset}",
            self.base_url,
            user_id.as_ref()
        );

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// List a user's tool usage history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_usage(
        &self,
        user_id: impl AsRef<str>,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryResponse, ClientError> {
        let url = format!(
            "{}/v1/credits/{}/usage?limit={limit}&offset={offset}",
            self.base_url,
            user_id.as_ref()
        );

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Per-tool usage totals for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn usage_totals(
        &self,
        user_id: impl AsRef<str>,
    ) -> Result<UsageTotalsResponse, ClientError> {
        let url = format!(
            "{}/v1/credits/{}/usage/totals",
            self.base_url,
            user_id.as_ref()
        );

        let response = self.get(&url).send().await?;
        self.handle_response(response).await
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;
                let details = api_error.error.details;

                // Map specific error codes to typed errors
                match code {
                    "insufficient_credits" => {
                        let balance = details
                            .as_ref()
                            .and_then(|d| d.get("balance"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);
                        let required = details
                            .as_ref()
                            .and_then(|d| d.get("required"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);

                        Err(ClientError::InsufficientCredits { balance, required })
                    }
                    "reservation_closed" => {
                        let field = |name: &str| {
                            details
                                .as_ref()
                                .and_then(|d| d.get(name))
                                .and_then(serde_json::Value::as_str)
                                .unwrap_or("unknown")
                                .to_string()
                        };

                        Err(ClientError::ReservationClosed {
                            reservation_id: field("reservation_id"),
                            status: field("status"),
                        })
                    }
                    "not_found" => Err(ClientError::NotFound { message }),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = CreditLedgerClient::new("http://localhost:8080", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = CreditLedgerClient::new("http://localhost:8080/", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions::with_service_name("cv-review-service");
        let client = CreditLedgerClient::with_options("http://localhost:8080", "key", options);
        assert_eq!(client.service_name, "cv-review-service");
    }
}
