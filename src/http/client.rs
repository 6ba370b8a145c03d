//! HTTP client with bearer authentication and built-in retry logic.

use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::auth::{AuthorizationProvider, Credentials, CredentialExchange, Token};
use crate::error::{NonRetryableError, RetryError, classify_transport_error};
use crate::retry::{Cancellation, Outcome, RetryOrchestrator, RetryPolicy};

/// HTTP client that injects a cached bearer token into every request,
/// re-authorizes on 401 and retries transport faults.
///
/// Clones share the connection pool and the token cache.
pub struct RetryableClient<P = CredentialExchange> {
    client: Client,
    orchestrator: RetryOrchestrator<P>,
}

impl<P> Clone for RetryableClient<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl RetryableClient<CredentialExchange> {
    /// Creates a client that exchanges `credentials` for a token at
    /// `auth_url`, sharing `client` for both authorization and requests.
    pub fn with_credentials(
        client: Client,
        auth_url: impl Into<String>,
        credentials: Credentials,
        policy: RetryPolicy,
    ) -> Self {
        let provider = CredentialExchange::new(client.clone(), auth_url, credentials);
        Self::new(client, provider, policy)
    }
}

impl<P: AuthorizationProvider> RetryableClient<P> {
    pub fn new(client: Client, provider: P, policy: RetryPolicy) -> Self {
        Self {
            client,
            orchestrator: RetryOrchestrator::new(provider, policy),
        }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator<P> {
        &self.orchestrator
    }

    /// Drops the cached token; the next request re-authorizes.
    pub fn invalidate_token(&self) {
        debug!("Discarding cached token on request");
        self.orchestrator.cache().clear();
    }

    /// Performs a GET request. Every status except 401 is returned unmodified.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get(
        &self,
        url: &str,
        cancel: &Cancellation,
    ) -> Result<Outcome<Response>, RetryError> {
        debug!("GET {}...", url);

        self.orchestrator
            .execute(
                "GET",
                |token: Token| {
                    let request = self.client.get(url).bearer_auth(token.secret());
                    async move { request.send().await.map_err(classify_transport_error) }
                },
                cancel,
            )
            .await
    }

    /// Performs a POST request with a JSON body. The body is serialized
    /// afresh for every attempt.
    #[tracing::instrument(skip(self, body, cancel))]
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        cancel: &Cancellation,
    ) -> Result<Outcome<Response>, RetryError> {
        debug!("POST {}...", url);

        self.orchestrator
            .execute(
                "POST",
                |token: Token| {
                    let request = serde_json::to_vec(body)
                        .map_err(|e| {
                            anyhow::Error::from(NonRetryableError::Serialization(e.to_string()))
                        })
                        .map(|payload| {
                            self.client
                                .post(url)
                                .bearer_auth(token.secret())
                                .header(CONTENT_TYPE, "application/json")
                                .body(payload)
                        });
                    async move { request?.send().await.map_err(classify_transport_error) }
                },
                cancel,
            )
            .await
    }

    /// Performs a GET request and deserializes a 2xx JSON response.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &Cancellation,
    ) -> Result<Outcome<T>, RetryError> {
        match self.get(url, cancel).await? {
            Outcome::Completed(response) => decode_json(response, cancel).await,
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }

    /// Performs a POST request with a JSON body and deserializes a 2xx JSON
    /// response.
    #[tracing::instrument(skip(self, body, cancel))]
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        cancel: &Cancellation,
    ) -> Result<Outcome<T>, RetryError> {
        match self.post(url, body, cancel).await? {
            Outcome::Completed(response) => decode_json(response, cancel).await,
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }
}

/// Reads a JSON body, rejecting non-2xx statuses.
async fn decode_json<T: DeserializeOwned>(
    response: Response,
    cancel: &Cancellation,
) -> Result<Outcome<T>, RetryError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RetryError::UnexpectedStatus { status });
    }

    match cancel.run_until_cancelled(response.json::<T>()).await {
        Some(Ok(value)) => Ok(Outcome::Completed(value)),
        Some(Err(e)) => Err(RetryError::Decode(e.to_string())),
        None => Ok(Outcome::Cancelled),
    }
}
