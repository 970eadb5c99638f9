use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CredentialError, Id, Item, PlayerEvent, RemoteError, RemoteSnapshot, ReportSender, UserId};

pub type ArcedPlayer = Arc<dyn Player>;
pub type PlayerId = Id<ArcedPlayer>;
pub type PlayerResult<T> = Result<T, PlayerError>;

/// The playback state of a player, and of the session driving it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Ready,
    Playing,
    Paused,
    Interrupted,
}

/// The external playback sources a party can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Spotify,
}

impl PlayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
        }
    }
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player has no items to play")]
    NoItems,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Drives one external playback source for one session.
#[async_trait]
pub trait Player: Send + Sync {
    fn id(&self) -> PlayerId;

    fn kind(&self) -> PlayerKind;

    /// Plays the given items, replacing the working set.
    /// Without items, the remembered working set is resumed or re-issued.
    async fn play(&self, items: Option<Vec<Item>>) -> PlayerResult<()>;

    async fn pause(&self) -> PlayerResult<()>;

    async fn resume(&self) -> PlayerResult<()>;

    /// Skips the current item on the remote and consumes it.
    async fn next(&self) -> PlayerResult<()>;

    fn has_items(&self) -> bool;

    /// Stops polling and forgets the working set.
    fn stop(&self);

    fn state(&self) -> PlayerState;

    /// Compares a polled snapshot against the previous one and returns the transition, if any.
    fn reconcile(&self, snapshot: Option<RemoteSnapshot>) -> Option<PlayerEvent>;
}

/// Creates players of a single kind, bound to a host's credentials.
pub trait PlayerFactory: Send + Sync {
    fn kind(&self) -> PlayerKind;

    /// Creates a player for the host. Poll results are sent to `reports`.
    fn create(&self, host: &UserId, reports: ReportSender) -> ArcedPlayer;
}
