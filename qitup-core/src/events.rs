use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{PlayerId, RemoteSnapshot};

pub type ReportSender = UnboundedSender<PollReport>;
pub type ReportReceiver = UnboundedReceiver<PollReport>;

/// A semantic transition derived from the remote player's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Playback of the expected item started or resumed
    Play,
    /// Playback was paused outside of a direct call
    Pause,
    /// Something else took over the remote player
    Interrupted,
    /// The current item ended and was consumed
    TrackFinished,
}

/// The result of a single poll, sent by an adapter's polling task to the owning session.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub player_id: PlayerId,
    pub snapshot: Option<RemoteSnapshot>,
}
