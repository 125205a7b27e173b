//! CLI error types and exit codes

use simfleet_db::DbError;
use simfleet_kore::KoreError;
use simfleet_provisioning::ProvisioningError;
use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Provider authentication failed
/// - 3: Network or database connectivity error
/// - 4: Validation error / request rejected
/// - 5: Provider server error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error: {0}")]
    Server(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Auth(_) => 2,
            CliError::Network(_) | CliError::DatabaseUnavailable(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) | CliError::Conflict(_) => 4,
            CliError::Server(_) => 5,
            CliError::Config(_)
            | CliError::Database(_)
            | CliError::Io(_)
            | CliError::Json(_) => 1,
        }
    }

    /// Print the error to stderr with formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => {
                Some("Check your environment or .env file for the required variables.")
            }
            CliError::Auth(_) => {
                Some("Verify KORE_CLIENT_ID, KORE_CLIENT_SECRET, and KORE_API_GATEWAY_KEY.")
            }
            CliError::Network(_) => Some("The request may succeed if retried."),
            CliError::DatabaseUnavailable(_) => {
                Some("Check DATABASE_URL and that Postgres is running.")
            }
            CliError::Conflict(_) => {
                Some("Run 'simfleet reconcile <subscription-id>' once the pending request completes.")
            }
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(_) => CliError::DatabaseUnavailable(err.to_string()),
            DbError::IccidMismatch { .. } => CliError::Conflict(err.to_string()),
            DbError::ValidationFailed(msg) => CliError::Validation(msg),
            other => CliError::Database(other.to_string()),
        }
    }
}

impl From<KoreError> for CliError {
    fn from(err: KoreError) -> Self {
        if let KoreError::InvalidConfig(_) = err {
            return CliError::Config(err.to_string());
        }
        classify(&err)(err.to_string())
    }
}

impl From<ProvisioningError> for CliError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::Auth(e) => CliError::Auth(e.to_string()),
            ProvisioningError::Submission { ref source, .. } => classify(source)(err.to_string()),
            ProvisioningError::AlreadyProcessing { .. }
            | ProvisioningError::ConcurrentRequest { .. } => CliError::Conflict(err.to_string()),
            ProvisioningError::DeviceNotFound(id) => CliError::NotFound(format!("device {id}")),
            ProvisioningError::Persistence(e) => e.into(),
            ProvisioningError::Provider(e) => e.into(),
        }
    }
}

/// Pick the CLI error class for a provider failure.
fn classify(err: &KoreError) -> fn(String) -> CliError {
    match err {
        KoreError::Auth(_) => CliError::Auth,
        KoreError::Http { status, .. } if *status < 500 && *status != 429 => CliError::Validation,
        KoreError::Business { .. } => CliError::Validation,
        KoreError::Parse { .. } => CliError::Server,
        _ if err.is_server_error() => CliError::Server,
        _ => CliError::Network,
    }
}
