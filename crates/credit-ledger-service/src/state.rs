//! Application state.

use std::sync::Arc;

use credit_ledger_store::Store;

use crate::config::ServiceConfig;
use crate::ledger::Ledger;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger service.
    pub ledger: Arc<Ledger>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let ledger = Arc::new(Ledger::new(
            store,
            config.welcome_credits,
            config.reservation_ttl_seconds,
        ));

        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not configured - all API requests will be rejected");
        }

        Self { ledger, config }
    }
}
