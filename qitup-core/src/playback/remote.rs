use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the external player reports it is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub playing: bool,
    /// The source key of the item on the remote, if any
    pub item: Option<String>,
    /// Position in milliseconds
    pub progress: u64,
}

impl RemoteSnapshot {
    pub fn new(playing: bool, item: impl Into<String>, progress: u64) -> Self {
        Self {
            playing,
            item: Some(item.into()),
            progress,
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The access token is no longer accepted
    #[error("Access token expired")]
    Expired,
    #[error("Rate limited by remote")]
    RateLimited,
    #[error("Remote responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Request to remote failed: {0}")]
    Request(String),
}

/// Commands understood by an external playback service.
#[async_trait]
pub trait RemotePlayback: Send + Sync + 'static {
    /// Starts playing the given source keys in order, from the first one.
    async fn play(&self, token: &str, keys: &[String]) -> Result<(), RemoteError>;
    async fn resume(&self, token: &str) -> Result<(), RemoteError>;
    async fn pause(&self, token: &str) -> Result<(), RemoteError>;
    async fn skip(&self, token: &str) -> Result<(), RemoteError>;
    /// Returns `None` if the remote has no active playback.
    async fn snapshot(&self, token: &str) -> Result<Option<RemoteSnapshot>, RemoteError>;
}
