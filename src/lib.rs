pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;

pub use auth::{AuthorizationProvider, CredentialExchange, Credentials, Token, TokenLocation};
pub use config::ClientConfig;
pub use error::RetryError;
pub use http::RetryableClient;
pub use retry::{Cancellation, Outcome, RetryOrchestrator, RetryPolicy};
