//! Default provider: exchanges credentials for a token at an HTTP endpoint.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use super::{AuthorizationProvider, Credentials, Token, TokenExtractor, TokenLocation};
use crate::retry::Cancellation;

/// POSTs the credentials as JSON to an authentication URI and extracts the
/// token from the response.
///
/// The request carries no authorization header of its own and the shared
/// `Client` is never reconfigured, so nothing leaks into other calls.
pub struct CredentialExchange<E = TokenLocation> {
    client: Client,
    auth_url: String,
    credentials: Credentials,
    extractor: E,
}

impl CredentialExchange<TokenLocation> {
    /// Creates an exchange that treats the whole response body as the token.
    pub fn new(client: Client, auth_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            credentials,
            extractor: TokenLocation::Body,
        }
    }
}

impl<E: TokenExtractor> CredentialExchange<E> {
    /// Swaps the token extraction strategy.
    pub fn with_extractor<X: TokenExtractor>(self, extractor: X) -> CredentialExchange<X> {
        CredentialExchange {
            client: self.client,
            auth_url: self.auth_url,
            credentials: self.credentials,
            extractor,
        }
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Single exchange round-trip without cancellation handling.
    async fn exchange(&self) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.auth_url)
            .json(&self.credentials)
            .send()
            .await
            .context("Failed to send credentials to authorization endpoint")?;

        let status = response.status();
        if !status.is_success() {
            bail!("authorization endpoint returned HTTP {}", status);
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .context("Failed to read authorization response")?;

        Ok(self.extractor.extract(&headers, &body))
    }
}

#[async_trait]
impl<E: TokenExtractor> AuthorizationProvider for CredentialExchange<E> {
    #[tracing::instrument(skip(self, cancel))]
    async fn authorize(&self, cancel: &Cancellation) -> Option<Token> {
        if cancel.is_cancelled() {
            debug!("Cancelled before authorizing");
            return None;
        }

        debug!(
            "Requesting token for {} from {}...",
            self.credentials.username(),
            self.auth_url
        );

        match cancel.run_until_cancelled(self.exchange()).await {
            None => {
                debug!("Authorization cancelled in flight");
                None
            }
            Some(Ok(Some(raw))) => Token::new(raw),
            Some(Ok(None)) => {
                warn!("Authorization response did not contain a token");
                None
            }
            Some(Err(e)) => {
                warn!("Authorization failed: {:#}", e);
                None
            }
        }
    }
}
