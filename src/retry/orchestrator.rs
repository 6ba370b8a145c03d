//! The retry/reauthentication loop.

use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;

use super::outcome::{AttemptOutcome, Outcome, StatusResponse};
use super::{Cancellation, RetryPolicy};
use crate::auth::{AuthorizationProvider, Token, TokenCache};
use crate::error::RetryError;

/// Runs request actions with a bearer token, re-authorizing on 401 and
/// backing off on transport faults.
///
/// Cloning is cheap and clones share the token cache.
pub struct RetryOrchestrator<P> {
    cache: Arc<TokenCache<P>>,
    policy: RetryPolicy,
}

impl<P> Clone for RetryOrchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            policy: self.policy,
        }
    }
}

impl<P: AuthorizationProvider> RetryOrchestrator<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self {
            cache: Arc::new(TokenCache::new(provider)),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &TokenCache<P> {
        &self.cache
    }

    /// Executes `action` until it yields a response other than 401.
    ///
    /// Each iteration makes sure a token is cached (authorizing if needed),
    /// hands it to `action`, and classifies the result:
    ///
    /// - 401: the token is dropped from the cache and the next attempt
    ///   starts immediately.
    /// - transport fault: the token is kept and the next attempt starts
    ///   after the policy's retry delay. A fault on the final attempt ends
    ///   the call right away without waiting.
    /// - anything else: returned as-is.
    ///
    /// At most `max_attempts` actions are invoked. A provider that yields no
    /// token ends the call with [`RetryError::AuthenticationFailed`] without
    /// consuming further attempts. Cancellation is observed before every
    /// attempt and during authorization, the action and the backoff wait.
    #[tracing::instrument(skip(self, action, cancel))]
    pub async fn execute<F, Fut, R>(
        &self,
        operation_name: &str,
        action: F,
        cancel: &Cancellation,
    ) -> Result<Outcome<R>, RetryError>
    where
        F: Fn(Token) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
        R: StatusResponse,
    {
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                debug!("{}: cancelled before attempt {}", operation_name, attempt);
                return Ok(Outcome::Cancelled);
            }

            let token = match cancel
                .run_until_cancelled(self.cache.get_or_acquire(cancel))
                .await
            {
                Some(Some(token)) => token,
                Some(None) if !cancel.is_cancelled() => {
                    warn!("{}: no token could be obtained", operation_name);
                    return Err(RetryError::AuthenticationFailed(
                        "authorization provider returned no token".to_string(),
                    ));
                }
                _ => {
                    debug!("{}: cancelled while authorizing", operation_name);
                    return Ok(Outcome::Cancelled);
                }
            };

            debug!(
                "{}: attempt {}/{} with token {}",
                operation_name,
                attempt,
                max_attempts,
                token.preview()
            );

            let outcome = match cancel.run_until_cancelled(action(token.clone())).await {
                Some(result) => AttemptOutcome::classify(result),
                None => AttemptOutcome::Cancelled,
            };

            match outcome {
                AttemptOutcome::Success(response) => {
                    debug!(
                        "{}: completed with HTTP {} on attempt {}",
                        operation_name,
                        response.status(),
                        attempt
                    );
                    return Ok(Outcome::Completed(response));
                }
                AttemptOutcome::Cancelled => {
                    debug!("{}: cancelled during attempt {}", operation_name, attempt);
                    return Ok(Outcome::Cancelled);
                }
                AttemptOutcome::Rejected(e) => {
                    debug!("{}: non-retryable error: {:#}", operation_name, e);
                    return Err(RetryError::InvalidRequest(format!("{:#}", e)));
                }
                AttemptOutcome::Unauthorized => {
                    warn!(
                        "{}: attempt {}/{} unauthorized, discarding token",
                        operation_name, attempt, max_attempts
                    );
                    self.cache.invalidate(&token);
                }
                AttemptOutcome::TransportFailure(e) => {
                    if attempt < max_attempts {
                        let delay = self.policy.retry_delay();
                        warn!(
                            "{}: attempt {}/{} failed ({:#}), retrying in {}ms...",
                            operation_name,
                            attempt,
                            max_attempts,
                            e,
                            delay.as_millis()
                        );
                        if cancel
                            .run_until_cancelled(tokio::time::sleep(delay))
                            .await
                            .is_none()
                        {
                            debug!("{}: cancelled during backoff", operation_name);
                            return Ok(Outcome::Cancelled);
                        }
                    } else {
                        warn!(
                            "{}: attempt {}/{} failed ({:#})",
                            operation_name, attempt, max_attempts, e
                        );
                    }
                }
            }
        }

        Err(RetryError::RetriesExceeded {
            attempts: max_attempts,
        })
    }
}
