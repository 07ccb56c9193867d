use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure of an LLM completion call, uniform across providers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("{provider}: authentication failed: {message}")]
    AuthenticationFailure { provider: String, message: String },

    #[error("{provider}: rate limited: {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{provider}: invalid request: {message}")]
    InvalidRequest { provider: String, message: String },

    #[error("{provider}: network failure: {message}")]
    NetworkFailure { provider: String, message: String },

    #[error("{provider}: provider error{}: {message}", status_suffix(.status))]
    ProviderError {
        provider: String,
        status: Option<u16>,
        message: String,
    },
}

impl LlmError {
    pub fn auth(provider: &str, message: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn network(provider: &str, message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn provider(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response
    pub fn from_status(
        provider: &str,
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    ) -> Self {
        match status.as_u16() {
            401 | 403 => Self::auth(provider, body),
            429 => Self::RateLimited {
                provider: provider.to_string(),
                message: body,
                retry_after,
            },
            400 | 404 | 409 | 413 | 422 => Self::invalid(provider, body),
            code => Self::provider(provider, Some(code), body),
        }
    }

    /// Whether the same request may succeed if sent again.
    /// Completion requests have no side effects, so this is only about
    /// whether the failure is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::NetworkFailure { .. } => true,
            Self::ProviderError { status, .. } => status.map_or(true, |s| s >= 500),
            Self::AuthenticationFailure { .. } | Self::InvalidRequest { .. } => false,
        }
    }

    pub fn provider_name(&self) -> &str {
        match self {
            Self::AuthenticationFailure { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::NetworkFailure { provider, .. }
            | Self::ProviderError { provider, .. } => provider,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

/// Failure while computing or comparing embeddings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding request failed ({provider}): {message}")]
    Request { provider: String, message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid embedding response ({provider}): {message}")]
    InvalidResponse { provider: String, message: String },
}
