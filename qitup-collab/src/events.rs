use qitup_core::{PlayerState, UserId};
use serde::Serialize;

use crate::{AttendeeData, PartyData, QueueSnapshot, UserProfile};

/// A machine-readable error sent to a client.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub msg: String,
}

/// Messages sent to the clients connected to a party.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SessionMessage {
    /// Sent to a client once it is attached
    #[serde(rename = "hello")]
    Hello {
        party: PartyData,
        queue: QueueSnapshot,
        state: PlayerState,
    },
    #[serde(rename = "attendee.active")]
    AttendeeActive { user: UserId },
    #[serde(rename = "attendee.offline")]
    AttendeeOffline { user: UserId },
    #[serde(rename = "queue.change")]
    QueueChange { queue: QueueSnapshot },
    #[serde(rename = "player.play")]
    PlayerPlay,
    #[serde(rename = "player.pause")]
    PlayerPause,
    #[serde(rename = "player.interrupted")]
    PlayerInterrupted,
    #[serde(rename = "attendees.change")]
    AttendeesChange { attendees: Vec<AttendeeData> },
    /// Sent only to the new host
    #[serde(rename = "host.promotion")]
    HostPromotion { host: UserProfile },
    #[serde(rename = "party.close")]
    PartyClose,
    #[serde(rename = "pong")]
    Pong { time: i64 },
    #[serde(rename = "error")]
    Error { error: ErrorBody },
}

impl SessionMessage {
    pub fn error(code: &'static str, msg: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody {
                code,
                msg: msg.into(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing these types can't fail: every map key is a string
        serde_json::to_string(self).unwrap_or_default()
    }
}
