//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::session::GameSessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failure taxonomy for remote fetches.
///
/// Sources absorb these internally: every variant collapses into the
/// cache → fallback → static-content chain and is logged, not surfaced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("request exceeded its deadline")]
    Timeout,

    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("api not configured")]
    NotConfigured,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    /// Classify a reqwest failure, folding timeouts into their own variant.
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }

    /// Classify a non-success status code.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::RateLimited
        } else {
            FetchError::UpstreamStatus(status)
        }
    }
}

/// Errors emitted by `QuestionSource`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionSourceError {
    /// Terminal condition: every fallback, including the static question,
    /// failed to produce content. Never expected in practice.
    #[error("no question available for category {category}")]
    Unavailable { category: String },
}

/// Errors emitted by `GameService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GameError {
    #[error("no active question to answer")]
    NoActiveQuestion,

    #[error(transparent)]
    Session(#[from] GameSessionError),

    #[error(transparent)]
    Question(#[from] QuestionSourceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
