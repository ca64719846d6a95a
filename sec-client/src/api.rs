use thiserror::Error;

/// Raised synchronously by `submit_events` when an event that survived throttling is malformed.
/// The whole call is aborted: none of its events reach the buffer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing payload object in event {0}")]
    MissingPayload(String),
    #[error("missing event-type in event {0}")]
    MissingEventType(String),
    #[error("invalid event-type in event {0}")]
    InvalidEventType(String),
}

/// Errors talking to the collection backend: home document, settings and event submission.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("error parsing url {0}")]
    InvalidUrl(String),
    #[error("error parsing request headers")]
    InvalidHeaders(#[source] http::Error),
    #[error("{method} {url} answered with status {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },
    #[error("failed to parse response body: {0}")]
    InvalidBody(#[source] serde_json::Error),
    #[error("cannot serialize data to {0}")]
    UnsupportedContentType(String),
    #[error("failed to serialize batch: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("failed to compress batch: {0}")]
    Compression(#[source] std::io::Error),
}

impl TransportError {
    /// Status codes accepted as success for GETs, redirects included.
    pub fn check_status(method: &str, url: &str, status: u16) -> Result<(), TransportError> {
        if (200..400).contains(&status) {
            Ok(())
        } else {
            Err(TransportError::UnexpectedStatus {
                method: method.to_owned(),
                url: url.to_owned(),
                status,
            })
        }
    }
}
