//! Error types for the trading bot

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // External API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API timeout after {0}ms")]
    ApiTimeout(u64),

    #[error("Snapshot unavailable for {0}")]
    SnapshotUnavailable(String),

    // Swap execution errors
    #[error("Swap failed: {0}")]
    SwapFailed(String),

    #[error("Swap quote failed: {0}")]
    QuoteFailed(String),

    #[error("Scam token detected: {0}")]
    ScamDetected(String),

    // Ledger errors
    #[error("Token not found in ledger: {0}")]
    TokenNotFound(String),

    #[error("Ledger persistence failed: {0}")]
    LedgerPersistence(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api(_)
                | Error::ApiTimeout(_)
                | Error::SnapshotUnavailable(_)
                | Error::SwapFailed(_)
                | Error::QuoteFailed(_)
        )
    }

    /// Check if this error permanently disqualifies a token
    pub fn is_scam(&self) -> bool {
        matches!(self, Error::ScamDetected(_))
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::ApiTimeout(0)
        } else {
            Error::Api(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Api("503".to_string()).is_retryable());
        assert!(Error::SwapFailed("route not found".to_string()).is_retryable());
        assert!(!Error::ScamDetected("bad owner".to_string()).is_retryable());
        assert!(!Error::TokenNotFound("mint".to_string()).is_retryable());
    }

    #[test]
    fn test_scam_classification() {
        assert!(Error::ScamDetected("non-executable program".to_string()).is_scam());
        assert!(!Error::SwapFailed("timeout".to_string()).is_scam());
    }
}
