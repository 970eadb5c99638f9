use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qitup_core::PlayerKind;
use serde::{Deserialize, Serialize};

/// The type used for primary keys in the database.
pub type PrimaryKey = String;

/// A qitup account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub display_name: String,
    /// The token the user authenticates with
    pub token: String,
    /// Streaming-provider access tokens, by provider
    pub identities: HashMap<PlayerKind, String>,
}

/// The public part of a user, as shown to other party members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: PrimaryKey,
    pub display_name: String,
}

/// A shared listening session with one host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyData {
    pub id: PrimaryKey,
    pub host: UserProfile,
    /// Members other than the host, oldest first
    pub attendees: Vec<AttendeeData>,
    /// Unique among live parties
    pub join_code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub settings: PartySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySettings {
    /// Seconds without playback before the party is closed
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A member of a party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeData {
    pub user: UserProfile,
    pub joined_at: DateTime<Utc>,
}

impl UserData {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl PartyData {
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host.id == user_id
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.is_host(user_id) || self.attendees.iter().any(|a| a.user.id == user_id)
    }
}
