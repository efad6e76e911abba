/*!
 * Error types for the subrelay application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to an external service
/// (metadata lookup, subtitle search, download or translation backend)
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and body to the matching variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that reject a subtitle request before any work is scheduled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Target language is not in the supported table
    #[error("Unsupported language: {code}")]
    UnsupportedLanguage {
        /// The rejected language code
        code: String,
    },

    /// A required identifier (catalog id, season, episode) is missing
    #[error("Missing required parameter: {0}")]
    MissingIdentifier(String),

    /// An identifier is present but cannot be used as a storage path segment
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Media kind string could not be parsed
    #[error("Invalid media kind: {0}")]
    InvalidMediaKind(String),

    /// The artifact store could not be read
    #[error("Storage error: {0}")]
    Storage(String),
}
