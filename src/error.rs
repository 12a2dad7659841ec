//! Error types for the mail → table sync.

/// Top-level error type for a sync run.
///
/// Only fatal conditions surface here; per-message failures are logged and
/// tallied by the runner instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Credential bootstrap failed: {0}")]
    Bootstrap(#[from] std::io::Error),
}

/// Configuration errors, raised before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Authentication errors for either side of the sync. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials for {provider}: {hint}")]
    MissingCredentials { provider: String, hint: String },

    #[error("Failed to read token file {path}: {reason}")]
    TokenFile { path: String, reason: String },

    #[error("Token request to {provider} failed: {reason}")]
    TokenRequest { provider: String, reason: String },

    #[error("Token response from {provider} rejected with status {status}: {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },
}

/// Mail API errors (search and fetch).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Mail API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Remote table API errors.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Insert rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;
