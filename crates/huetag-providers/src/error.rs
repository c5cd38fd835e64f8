use huetag_core::{ProviderFamily, TagParseError};
use thiserror::Error;

/// Errors returned by provider adapters and the batch client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response envelope parsed but carried no usable text.
    #[error("empty response from {0}")]
    EmptyResponse(String),

    /// Model output could not be turned into a valid tag object.
    #[error(transparent)]
    Output(#[from] TagParseError),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no API key configured for {0}")]
    MissingApiKey(ProviderFamily),

    #[error("batch {batch_id} has no results yet (status: {status})")]
    ResultsUnavailable { batch_id: String, status: String },
}
