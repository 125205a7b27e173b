//! Environment configuration for the simfleet CLI.

use simfleet_kore::{KoreConfig, KoreCredentials};
use simfleet_provisioning::{ReconciliationConfig, WorkerConfig};

/// Everything the CLI needs, loaded from the environment.
#[derive(Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub kore: KoreConfig,
    pub kore_credentials: KoreCredentials,
    pub reconciliation: ReconciliationConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Lets tests supply variables without touching the process environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            match reader(key) {
                Ok(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(ConfigError::MissingVar(key.into())),
            }
        };

        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parse_or(&reader, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let kore = KoreConfig::new(
            required("KORE_API_BASE_URL")?,
            required("KORE_AUTH_TOKEN_URL")?,
            required("KORE_ACCOUNT_ID")?,
        )
        .with_request_timeout(parse_or(&reader, "KORE_REQUEST_TIMEOUT_SECS", 30u64)?);

        let kore_credentials = KoreCredentials::new(
            required("KORE_CLIENT_ID")?,
            required("KORE_CLIENT_SECRET")?,
            required("KORE_API_GATEWAY_KEY")?,
        );

        let max_concurrency = parse_or(&reader, "RECONCILE_CONCURRENCY", 8usize)?;
        if max_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "RECONCILE_CONCURRENCY".into(),
                "must be at least 1".into(),
            ));
        }
        let status_timeout_secs = parse_or(&reader, "RECONCILE_STATUS_TIMEOUT_SECS", 15u64)?;
        let interval_secs = parse_or(&reader, "RECONCILE_INTERVAL_SECS", 300u64)?;

        Ok(Self {
            database_url,
            database_max_connections,
            kore,
            kore_credentials,
            reconciliation: ReconciliationConfig {
                max_concurrency,
                status_timeout_ms: status_timeout_secs.saturating_mul(1_000),
            },
            worker: WorkerConfig { interval_secs },
        })
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        _ => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
