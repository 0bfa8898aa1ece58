use thiserror::Error;

/// Failures of the outbound GTFS-RT fetch.
///
/// None of these are fatal: the orchestrator degrades to an empty-positions
/// response instead of surfacing a 5xx.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("network error: {0}")]
    NetworkMessage(String),
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("API key not configured")]
    MissingApiKey,
}

impl FeedError {
    /// Whether the failure is "no credentials" rather than a broken feed.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, FeedError::MissingApiKey)
    }
}
