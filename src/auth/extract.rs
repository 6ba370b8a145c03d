//! Strategies for pulling a token out of an authorization response.

use reqwest::header::HeaderMap;

/// Extracts a raw token from a successful authorization response.
///
/// Any `Fn(&HeaderMap, &str) -> Option<String>` closure is an extractor, so
/// callers with a bespoke response format don't need a new type.
pub trait TokenExtractor: Send + Sync {
    fn extract(&self, headers: &HeaderMap, body: &str) -> Option<String>;
}

impl<F> TokenExtractor for F
where
    F: Fn(&HeaderMap, &str) -> Option<String> + Send + Sync,
{
    fn extract(&self, headers: &HeaderMap, body: &str) -> Option<String> {
        self(headers, body)
    }
}

/// Where the token lives in the authorization response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenLocation {
    /// The whole body is the token, optionally as a JSON string literal.
    #[default]
    Body,
    /// A top-level string field of a JSON object body, e.g. `access_token`.
    JsonField(String),
    /// A response header.
    Header(String),
}

impl TokenExtractor for TokenLocation {
    fn extract(&self, headers: &HeaderMap, body: &str) -> Option<String> {
        let raw = match self {
            TokenLocation::Body => {
                let trimmed = body.trim();
                trimmed
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(trimmed)
                    .to_string()
            }
            TokenLocation::JsonField(field) => {
                let value: serde_json::Value = serde_json::from_str(body).ok()?;
                value.get(field)?.as_str()?.to_string()
            }
            TokenLocation::Header(name) => headers.get(name.as_str())?.to_str().ok()?.to_string(),
        };

        if raw.trim().is_empty() { None } else { Some(raw) }
    }
}
