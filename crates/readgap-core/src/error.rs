//! Error types.
//!
//! `AssessmentError` covers failures of a single assessment step.
//! `ServiceError` represents failures when talking to a summary service; it
//! lives here so the scorer can downcast and classify errors for retry
//! decisions without string matching.

use thiserror::Error;
use uuid::Uuid;

/// Errors that abort the current assessment step.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("student not found: {0}")]
    StudentNotFound(Uuid),

    #[error("attempt not found: {0}")]
    AttemptNotFound(Uuid),

    /// No questions exist for the requested language.
    #[error("no questions available for language '{0}'")]
    CatalogEmpty(String),

    /// English is always the first block, so it cannot also be the home language.
    #[error("home language cannot be English: '{0}'")]
    EnglishHomeLanguage(String),

    #[error("attempt {0} is already completed")]
    AttemptCompleted(Uuid),

    /// The answered question does not belong to the attempt's current phase.
    #[error("question {question_id} ({language}) does not belong to the {phase} phase")]
    PhaseMismatch {
        question_id: String,
        language: String,
        phase: String,
    },

    #[error("choice {selected} is out of range for question {question_id} ({choices} choices)")]
    InvalidChoice {
        question_id: String,
        selected: usize,
        choices: usize,
    },

    /// The underlying question or attempt store failed.
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl AssessmentError {
    /// Returns `true` for failures caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AssessmentError::Store(_))
    }
}

/// Errors that can occur when calling a generative summary service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The service answered, but not with a usable assessment.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl ServiceError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ServiceError::AuthenticationFailed(_) | ServiceError::ModelNotFound(_) => true,
            // Asking again rarely turns a malformed reply into a good one.
            ServiceError::InvalidReply(_) => true,
            ServiceError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ServiceError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
