//! Error taxonomy for authenticated, retried requests.

use reqwest::StatusCode;
use thiserror::Error;

/// Terminal failures surfaced to callers.
///
/// Transport faults never appear here individually: they are retried
/// inside the orchestrator and only their exhaustion is reported, as
/// [`RetryError::RetriesExceeded`]. Cancellation is not an error either;
/// see [`crate::retry::Outcome`].
#[derive(Debug, Error)]
pub enum RetryError {
    /// The authorization provider could not produce a token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Every attempt was either unauthorized or a transport fault.
    #[error("Retries exceeded after {attempts} attempts")]
    RetriesExceeded { attempts: u32 },

    /// The request itself is broken and re-sending it cannot help.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A retry policy was constructed with out-of-range values.
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A typed helper received a non-2xx response it cannot decode.
    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: StatusCode },

    /// A typed helper could not decode a 2xx response body.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Errors raised inside a request action that must not be retried.
///
/// Actions report failures as `anyhow::Error`. Wrapping one of these
/// variants marks the failure as permanent; anything else is treated as
/// a transport fault and retried after the backoff delay.
#[derive(Debug, Error)]
pub enum NonRetryableError {
    /// The request body could not be serialized
    #[error("Failed to serialize request body: {0}")]
    Serialization(String),

    /// The request could not be built (bad URL, bad header value, ...)
    #[error("Request could not be built: {0}")]
    Build(String),
}

/// Converts a `reqwest` send error into the action error currency.
/// Builder errors are permanent; connection errors, timeouts and the like
/// stay retryable.
pub fn classify_transport_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_builder() {
        return anyhow::Error::from(NonRetryableError::Build(error.to_string()));
    }
    anyhow::Error::from(error).context("Failed to send request")
}

/// Checks if an action error may be retried.
pub fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_error_display() {
        let err = RetryError::AuthenticationFailed("no token".to_string());
        assert!(err.to_string().contains("Authentication failed"));

        let err = RetryError::RetriesExceeded { attempts: 3 };
        assert_eq!(err.to_string(), "Retries exceeded after 3 attempts");

        let err = RetryError::UnexpectedStatus {
            status: StatusCode::NOT_FOUND,
        };
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_is_retryable_error() {
        let err = anyhow::Error::from(NonRetryableError::Serialization("bad".to_string()));
        assert!(!is_retryable_error(&err));

        let err = anyhow::anyhow!("connection reset by peer");
        assert!(is_retryable_error(&err));
    }

    #[test]
    fn test_is_retryable_error_with_context() {
        let err = anyhow::Error::from(NonRetryableError::Build("bad url".to_string()))
            .context("while sending");
        assert!(!is_retryable_error(&err));
    }

    #[tokio::test]
    async fn test_classify_transport_error_builder_is_permanent() {
        let err = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();

        let classified = classify_transport_error(err);
        assert!(!is_retryable_error(&classified));
    }

    #[tokio::test]
    async fn test_classify_transport_error_connect_is_retryable() {
        // Port 9 (discard) on localhost is closed in practice
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();

        let classified = classify_transport_error(err);
        assert!(is_retryable_error(&classified));
    }
}
