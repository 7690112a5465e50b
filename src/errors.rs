/*!
 * Error types for the autosubs pipeline.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions. Translation errors
 * carry their own retry classification so the orchestrator never has to inspect
 * provider-specific details.
 */

use thiserror::Error;

/// Substrings that mark a provider failure as permanent regardless of HTTP status.
///
/// Several backends report credential and billing problems inside a 200/400 body
/// rather than with a dedicated status code.
const AUTH_MARKERS: &[&str] = &[
    "invalid_api_key",
    "authentication",
    "unauthorized",
    "api key not valid",
    "incorrect api key",
];
const BALANCE_MARKERS: &[&str] = &["insufficient balance", "insufficient_balance"];
const QUOTA_MARKERS: &[&str] = &["quota_exceeded", "insufficient_quota", "quota exceeded"];
const INVALID_ARGUMENT_MARKERS: &[&str] = &["invalid_argument"];

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
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

    /// The account behind the credentials has no balance left
    #[error("Insufficient Balance: {0}")]
    InsufficientBalance(String),

    /// The account quota has been used up
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The provider rejected the request parameters (unsupported language, bad model)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ProviderError {
    /// Build an error from a non-success HTTP response.
    ///
    /// Server-side failures stay transient whatever their body says. A 429 is
    /// a rate limit unless the body reports an exhausted quota or balance.
    /// Other statuses check the body for permanent failure markers first,
    /// since providers disagree on which code they use for billing problems.
    pub fn from_response(status_code: u16, body: impl Into<String>) -> Self {
        let message = body.into();

        match status_code {
            500..=599 | 408 => Self::ApiError { status_code, message },
            429 => match Self::from_message(&message) {
                Some(err @ (Self::QuotaExceeded(_) | Self::InsufficientBalance(_))) => err,
                _ => Self::RateLimitExceeded(message),
            },
            _ => {
                if let Some(err) = Self::from_message(&message) {
                    return err;
                }
                match status_code {
                    401 | 403 => Self::AuthenticationError(message),
                    402 => Self::InsufficientBalance(message),
                    400 | 422 => Self::InvalidArgument(message),
                    _ => Self::ApiError { status_code, message },
                }
            }
        }
    }

    /// Detect a permanent failure from free-form error text, if any marker matches.
    pub fn from_message(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

        if has(BALANCE_MARKERS) {
            Some(Self::InsufficientBalance(message.to_string()))
        } else if has(QUOTA_MARKERS) {
            Some(Self::QuotaExceeded(message.to_string()))
        } else if has(AUTH_MARKERS) {
            Some(Self::AuthenticationError(message.to_string()))
        } else if has(INVALID_ARGUMENT_MARKERS) {
            Some(Self::InvalidArgument(message.to_string()))
        } else {
            None
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if error.is_timeout() || error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_response(status.as_u16(), error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubtitleError {
    /// The input contained text but not a single recognisable block
    #[error("No subtitle blocks found in document")]
    NoBlocks,
}

/// Errors that can occur during translation of a subtitle document.
///
/// Retryable variants are retried inside the batch orchestrator; every other
/// variant is fatal for the job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// The source subtitle could not be parsed
    #[error("Subtitle parse error: {0}")]
    Parse(#[from] SubtitleError),

    /// Transport-level failure talking to a backend
    #[error("Network error: {0}")]
    Network(String),

    /// Transient failure reported by the backend (5xx, malformed body)
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Account quota used up
    #[error("Quota exceeded: {0}")]
    Quota(String),

    /// Account balance exhausted
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Request rejected as malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend merged or split lines
    #[error("Translated entry count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Number of texts sent
        expected: usize,
        /// Number of texts received
        actual: usize,
    },

    /// A retryable error persisted through every allowed attempt
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// The error from the final attempt
        last: Box<TranslationError>,
    },

    /// Reading or writing a cache or temporary file failed
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// The pipeline was invoked with unusable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The job was aborted before it finished
    #[error("Translation job cancelled")]
    Cancelled,

    /// The job's task panicked
    #[error("Translation job panicked: {0}")]
    JobPanicked(String),
}

impl TranslationError {
    /// Whether the orchestrator may try the same batch again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Backend(_) | Self::RateLimited(_) | Self::CountMismatch { .. }
        )
    }

    /// The innermost error, looking through retry exhaustion
    pub fn root(&self) -> &TranslationError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Human-readable reason shown to the viewer inside a failure placeholder
    pub fn user_message(&self) -> String {
        let detail = match self.root() {
            Self::InsufficientBalance(_) => {
                "API account has insufficient balance. Please top up your account."
            }
            Self::Authentication(_) => "Invalid API key. Please check your configuration.",
            Self::Quota(_) => "API quota exceeded. Please wait or upgrade your plan.",
            Self::RateLimited(_) => "Rate limit exceeded. Please wait a moment and try again.",
            Self::InvalidArgument(_) => {
                "The translation service rejected the request. Please check the selected language and model."
            }
            Self::CountMismatch { .. } => {
                "The translation service returned an incomplete result. Please try again later."
            }
            Self::Parse(_) => "The source subtitle could not be read.",
            Self::Network(_) | Self::Backend(_) => {
                "The translation service is unavailable. Please try again later."
            }
            Self::Cancelled => "The translation was cancelled. Please try again.",
            Self::JobPanicked(_) => "An internal error interrupted the translation. Please try again.",
            Self::Filesystem(_) | Self::Config(_) | Self::RetriesExhausted { .. } => {
                "Please check your configuration and try again."
            }
        };
        format!("Translation failed. {}", detail)
    }
}

impl From<ProviderError> for TranslationError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::RequestFailed(m) | ProviderError::ConnectionError(m) => Self::Network(m),
            ProviderError::ParseError(m) => Self::Backend(m),
            ProviderError::ApiError { status_code, message } => {
                if status_code >= 500 || status_code == 408 {
                    Self::Backend(format!("{} - {}", status_code, message))
                } else {
                    Self::InvalidArgument(format!("{} - {}", status_code, message))
                }
            }
            ProviderError::RateLimitExceeded(m) => Self::RateLimited(m),
            ProviderError::AuthenticationError(m) => Self::Authentication(m),
            ProviderError::InsufficientBalance(m) => Self::InsufficientBalance(m),
            ProviderError::QuotaExceeded(m) => Self::Quota(m),
            ProviderError::InvalidArgument(m) => Self::InvalidArgument(m),
        }
    }
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        Self::Filesystem(error.to_string())
    }
}
