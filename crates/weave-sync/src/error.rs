use weave_types::api::PageError;

/// Failure reported by the backend channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{app} rejected request: {reason}")]
    Rejected { app: String, reason: String },
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("subscription closed")]
    Closed,
    #[error("undecodable response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("bad page: {0}")]
    Page(#[from] PageError),
    #[error("bad payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid entry id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
