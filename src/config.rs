use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;

use crate::auth::{CredentialExchange, Credentials, TokenLocation};
use crate::http::RetryableClient;
use crate::retry::RetryPolicy;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("retryable/", env!("RETRYABLE_VERSION"));

/// Everything needed to build a [`RetryableClient`] that authenticates
/// against a credential-exchange endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auth_url: String,
    pub credentials: Credentials,
    pub policy: RetryPolicy,
    pub token_location: TokenLocation,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(auth_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            auth_url: auth_url.into(),
            credentials,
            policy: RetryPolicy::default(),
            token_location: TokenLocation::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_token_location(mut self, token_location: TokenLocation) -> Self {
        self.token_location = token_location;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the client. The underlying `reqwest::Client` carries no default
    /// authorization header; tokens are attached per request.
    pub fn build(self) -> Result<RetryableClient<CredentialExchange>> {
        debug!(
            "Building client for {} against {} ({} attempts, {}ms delay)",
            self.credentials.username(),
            self.auth_url,
            self.policy.max_attempts(),
            self.policy.retry_delay().as_millis()
        );

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        let provider = CredentialExchange::new(client.clone(), self.auth_url, self.credentials)
            .with_extractor(self.token_location);

        Ok(RetryableClient::new(client, provider, self.policy))
    }
}
