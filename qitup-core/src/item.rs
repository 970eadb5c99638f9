use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PlayerKind;

/// Opaque identifier of a user.
pub type UserId = String;

/// Playback flags of a single queue item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    /// Position in milliseconds
    pub progress: u64,
    pub playing: bool,
    /// Once set, never cleared
    pub completed: bool,
}

impl ItemState {
    /// Marks the item as playing. Returns false if nothing changed.
    pub fn play(&mut self) -> bool {
        if self.playing || self.completed {
            return false;
        }

        self.playing = true;
        true
    }

    /// Marks the item as paused. Returns false if nothing changed.
    pub fn pause(&mut self) -> bool {
        if !self.playing {
            return false;
        }

        self.playing = false;
        true
    }

    /// Marks the item as completed. Returns false if it already was.
    pub fn done(&mut self) -> bool {
        if self.completed {
            return false;
        }

        self.playing = false;
        self.completed = true;
        true
    }
}

/// Where an item is played from, and the reference the source needs to play it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemSource {
    SpotifyTrack { uri: String },
    SpotifyEpisode { uri: String },
}

/// The discriminator of an [ItemSource].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    SpotifyTrack,
    SpotifyEpisode,
}

impl ItemKind {
    /// The kind of player able to play items of this kind.
    pub fn player_kind(&self) -> PlayerKind {
        match self {
            Self::SpotifyTrack | Self::SpotifyEpisode => PlayerKind::Spotify,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpotifyTrack => "spotify_track",
            Self::SpotifyEpisode => "spotify_episode",
        }
    }
}

/// An entry in a party queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub source: ItemSource,
    #[serde(default)]
    pub added_by: Option<UserId>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: ItemState,
}

impl Item {
    pub fn new(source: ItemSource) -> Self {
        Self {
            source,
            added_by: None,
            added_at: None,
            state: Default::default(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self.source {
            ItemSource::SpotifyTrack { .. } => ItemKind::SpotifyTrack,
            ItemSource::SpotifyEpisode { .. } => ItemKind::SpotifyEpisode,
        }
    }

    /// The reference the external player knows this item by.
    pub fn source_key(&self) -> &str {
        match &self.source {
            ItemSource::SpotifyTrack { uri } | ItemSource::SpotifyEpisode { uri } => uri,
        }
    }

    /// Records who added the item and when.
    pub fn stamp(&mut self, by: UserId) {
        self.added_by = Some(by);
        self.added_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_completed_is_terminal() {
        let mut state = ItemState::default();

        assert!(state.play());
        assert!(!state.play());
        assert!(state.done());

        assert!(!state.playing);
        assert!(!state.play());
        assert!(!state.done());
        assert!(state.completed);
    }

    #[test]
    fn test_pause_only_when_playing() {
        let mut state = ItemState::default();

        assert!(!state.pause());
        state.play();
        assert!(state.pause());
        assert!(!state.playing);
    }

    #[test]
    fn test_item_json_shape() {
        let raw = r#"{
            "type": "spotify_track",
            "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
            "added_by": "u1",
            "state": { "progress": 10, "playing": true, "completed": false }
        }"#;

        let item: Item = serde_json::from_str(raw).unwrap();

        assert_eq!(item.kind(), ItemKind::SpotifyTrack);
        assert_eq!(item.source_key(), "spotify:track:4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(item.added_by.as_deref(), Some("u1"));
        assert!(item.state.playing);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "spotify_track");
        assert_eq!(value["state"]["progress"], 10);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = r#"{ "type": "cassette", "uri": "a" }"#;

        assert!(serde_json::from_str::<Item>(raw).is_err());
    }

    #[test]
    fn test_stamp() {
        let mut item = Item::new(ItemSource::SpotifyEpisode {
            uri: "spotify:episode:1".into(),
        });
        item.stamp("someone".into());

        assert_eq!(item.kind().as_str(), "spotify_episode");
        assert_eq!(item.kind().player_kind(), PlayerKind::Spotify);
        assert_eq!(item.added_by.as_deref(), Some("someone"));
        assert!(item.added_at.is_some());
    }
}
