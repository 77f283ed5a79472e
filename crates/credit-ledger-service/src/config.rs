//! Service configuration.

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/credit-ledger").
    pub data_dir: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// One-time credit grant applied when an account is first created
    /// (default: 1).
    pub welcome_credits: i64,

    /// How long a reservation may stay pending before the sweeper reverts it
    /// (default: 3600 seconds).
    pub reservation_ttl_seconds: u64,

    /// How often the sweeper runs (default: 300 seconds).
    pub sweep_interval_seconds: u64,

    /// Maximum reservations reverted per sweep tick (default: 256).
    pub sweep_batch_size: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/credit-ledger".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            welcome_credits: env_parsed("WELCOME_CREDITS", 1),
            reservation_ttl_seconds: env_parsed("RESERVATION_TTL_SECONDS", 3600),
            sweep_interval_seconds: env_parsed("SWEEP_INTERVAL_SECONDS", 300),
            sweep_batch_size: env_parsed("SWEEP_BATCH_SIZE", 256),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parsed("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parsed("REQUEST_TIMEOUT_SECONDS", 30),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/credit-ledger".into(),
            service_api_key: None,
            welcome_credits: 1,
            reservation_ttl_seconds: 3600,
            sweep_interval_seconds: 300,
            sweep_batch_size: 256,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
