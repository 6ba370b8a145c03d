//! Bearer token acquisition and caching.
//!
//! An [`AuthorizationProvider`] turns configured credentials into a
//! [`Token`]. The [`TokenCache`] holds at most one token per client and
//! makes sure concurrent callers share a single in-flight authorization.

mod cache;
mod exchange;
mod extract;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::retry::Cancellation;

pub use cache::TokenCache;
pub use exchange::CredentialExchange;
pub use extract::{TokenExtractor, TokenLocation};

/// An opaque bearer token. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wraps a raw token value, returning `None` for empty or blank input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// The raw token, for building the authorization header.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// A masked form safe for logs.
    pub fn preview(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}****{}", head, tail)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.preview()).finish()
    }
}

/// Username/password pair sent to the authorization endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Obtains a fresh bearer token.
///
/// Returns `None` when no token could be obtained: the endpoint rejected the
/// credentials, the response held no extractable token, or `cancel` had
/// already fired (in which case no network call is made). Implementations
/// must keep any header manipulation scoped to their own request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn authorize(&self, cancel: &Cancellation) -> Option<Token>;
}
