//! Nscale provider error types

use thiserror::Error;

/// Errors raised by the Nscale API client
#[derive(Error, Debug)]
pub enum NscaleError {
    /// The provider answered with a non-2xx status. The body is
    /// truncated before being embedded in the message.
    #[error("API request failed: {method} {url} | Response Status: {status} | Response Body: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (timeout, connection
    /// refused, DNS failure).
    #[error("API request failed: {method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response that is not JSON. The provider has been observed
    /// returning HTML error pages with a 200 status, so this is
    /// treated as a failure instead of handing back malformed data.
    #[error(
        "Expected JSON response but got Content-Type: {content_type}. Status: {status}, Body: {preview}"
    )]
    UnexpectedContentType {
        content_type: String,
        status: u16,
        preview: String,
    },

    /// A JSON-labelled response body that fails to decode.
    #[error("Invalid JSON response. Status: {status}, Body: {preview}")]
    InvalidJson {
        status: u16,
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    /// A decoded response that does not match the expected shape.
    #[error("Unexpected response shape: {0}")]
    Json(#[from] serde_json::Error),

    /// An identity endpoint was called without an identity base URL.
    #[error("Identity API URL not configured")]
    IdentityNotConfigured,
}

pub type Result<T> = std::result::Result<T, NscaleError>;
