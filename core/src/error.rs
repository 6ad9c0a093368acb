//! Error types for the table client.
//!
//! # Design
//! Upstream error bodies (responses that carry no `records` key) are not
//! errors here: they come back as data through `Accumulated::Partial` or the
//! raw value returned by `TableClient::get`. `ClientError` covers everything
//! that stops an operation: bad configuration, rejected input, a failed
//! round-trip, an unreadable body and an incomplete deletion.

use thiserror::Error;

use crate::types::DeletedRecord;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by `TableConfig` and `TableClient`.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A required setting was neither passed explicitly nor found in the
    /// environment.
    #[error("missing {name}: pass it explicitly or set {env}")]
    Configuration {
        name: &'static str,
        env: &'static str,
    },

    /// Input rejected before any request was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The transport failed to complete the round-trip.
    ///
    /// A response that arrives but cannot be decoded (a non-JSON body, for
    /// example) is reported as `InvalidResponse`, not here.
    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be interpreted.
    #[error("invalid response (HTTP {status}): {message}")]
    InvalidResponse { status: u16, message: String },

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Upstream deleted fewer records than a batch asked for. Deletions
    /// already applied are not undone; `removed` lists every record reported
    /// deleted so far, the short batch included.
    #[error("not all records were deleted: requested {requested}, upstream deleted {deleted}")]
    PartialDeletion {
        requested: usize,
        deleted: usize,
        removed: Vec<DeletedRecord>,
    },
}

impl ClientError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the error was raised before anything was sent upstream.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Validation(_) | Self::Serialization(_)
        )
    }
}
