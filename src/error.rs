//! Error types for tap-pipefy
//!
//! This module defines the error hierarchy for the whole tap.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for tap-pipefy
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    /// Network-level failure that survived the retry budget.
    #[error("Transient fetch error after {attempts} attempts: {message}")]
    TransientFetch { attempts: u32, message: String },

    /// Authorization or validation failure from the API. Never retried.
    #[error("Fatal fetch error (HTTP {status}): {body}")]
    FatalFetch { status: u16, body: String },

    /// The API accepted the request but rejected the query.
    #[error("GraphQL query rejected: {message}")]
    GraphQl { message: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    // ============================================================================
    // Discovery Errors
    // ============================================================================
    #[error("Schema inference failed: {message}")]
    SchemaInference { message: String },

    /// Discovery could not enumerate every resource. No catalog is emitted.
    #[error("Catalog discovery incomplete: {message}")]
    CatalogIncomplete { message: String },

    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    // ============================================================================
    // Run Outcome
    // ============================================================================
    #[error("{failed} stream(s) failed during sync: {streams}")]
    SyncFailed { failed: usize, streams: String },

    // ============================================================================
    // Wrapped Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a transient fetch error
    pub fn transient(attempts: u32, message: impl Into<String>) -> Self {
        Self::TransientFetch {
            attempts,
            message: message.into(),
        }
    }

    /// Create a fatal fetch error
    pub fn fatal_fetch(status: u16, body: impl Into<String>) -> Self {
        Self::FatalFetch {
            status,
            body: body.into(),
        }
    }

    /// Create a GraphQL rejection error
    pub fn graphql(message: impl Into<String>) -> Self {
        Self::GraphQl {
            message: message.into(),
        }
    }

    /// Create a schema inference error
    pub fn schema_inference(message: impl Into<String>) -> Self {
        Self::SchemaInference {
            message: message.into(),
        }
    }

    /// Create a catalog-incomplete error
    pub fn catalog_incomplete(message: impl Into<String>) -> Self {
        Self::CatalogIncomplete {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Whether the underlying condition is worth retrying.
    ///
    /// `TransientFetch` itself is NOT retryable: it is what the client
    /// surfaces once the retry budget is spent.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::FatalFetch { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Whether this error aborts a single stream rather than the whole run.
    pub fn is_stream_failure(&self) -> bool {
        matches!(
            self,
            Error::TransientFetch { .. }
                | Error::FatalFetch { .. }
                | Error::GraphQl { .. }
                | Error::RateLimited { .. }
                | Error::Http(_)
                | Error::StreamNotFound { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for tap-pipefy
pub type Result<T> = std::result::Result<T, Error>;
