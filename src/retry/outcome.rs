//! Classification of attempts and caller-visible outcomes.

use reqwest::StatusCode;

use crate::error::is_retryable_error;

/// Anything carrying an HTTP status the orchestrator can classify.
pub trait StatusResponse {
    fn status(&self) -> StatusCode;
}

impl StatusResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

/// How a single physical attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    /// Any response other than 401, passed through unmodified.
    Success(R),
    /// HTTP 401: the injected token is stale.
    Unauthorized,
    /// Network error, timeout, or other fault worth a cooldown and retry.
    TransportFailure(anyhow::Error),
    /// A fault that re-sending cannot fix.
    Rejected(anyhow::Error),
    /// The caller's signal fired while the attempt was in flight.
    Cancelled,
}

impl<R: StatusResponse> AttemptOutcome<R> {
    /// Classifies the result of one action invocation.
    pub fn classify(result: anyhow::Result<R>) -> Self {
        match result {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => Self::Unauthorized,
            Ok(response) => Self::Success(response),
            Err(e) if is_retryable_error(&e) => Self::TransportFailure(e),
            Err(e) => Self::Rejected(e),
        }
    }
}

/// Result of a call that did not fail: either it completed, or the caller
/// cancelled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Returns the completed value, or `None` if the call was cancelled.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}
