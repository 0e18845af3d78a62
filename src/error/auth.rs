//! Errors raised while resolving a proxy key.

use thiserror::Error;

/// Rejections produced by the credential resolver.
///
/// The display strings are the exact plaintext bodies returned to proxy clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential header carried a value.
    #[error("API Key is missing")]
    ApiKeyMissing,

    /// The key is unknown, inactive, or belongs to an inactive provider.
    #[error("API Key is not found")]
    ApiKeyNotFound,
}

/// Errors that occur while parsing credential header templates.
#[derive(Debug, Error)]
pub enum AuthParseError {
    #[error(
        "Invalid authentication header format: '{0}'. Expected format: 'Header-Name: header-value'"
    )]
    InvalidFormat(String),

    #[error("Empty header name in format: '{0}'")]
    EmptyHeaderName(String),

    #[error("Empty header value template in format: '{0}'")]
    EmptyHeaderValue(String),

    #[error("Missing key placeholder '{{key}}' in header value: '{0}'")]
    MissingKeyPlaceholder(String),
}
