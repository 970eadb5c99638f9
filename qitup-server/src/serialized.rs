//! Response bodies that aren't plain engine types

use qitup_collab::{PartyConnect, PartyData, QueueSnapshot, UserData, UserProfile};
use serde::Serialize;

use crate::ServerConfig;

pub trait ToSerialized<T> {
    fn to_serialized(&self) -> T;
}

/// A newly created user, with the token it authenticates with
#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub token: String,
    pub user: UserProfile,
}

/// Everything a member needs to open a live connection to a party
#[derive(Debug, Serialize)]
pub struct PartyJoin {
    pub url: String,
    pub party: PartyData,
    pub queue: QueueSnapshot,
}

impl ToSerialized<CreatedUser> for UserData {
    fn to_serialized(&self) -> CreatedUser {
        CreatedUser {
            token: self.token.clone(),
            user: self.profile(),
        }
    }
}

impl ToSerialized<UserProfile> for UserData {
    fn to_serialized(&self) -> UserProfile {
        self.profile()
    }
}

impl PartyJoin {
    pub fn new(connect: PartyConnect, config: &ServerConfig) -> Self {
        Self {
            url: config.connect_url(&connect.token),
            party: connect.party,
            queue: connect.queue,
        }
    }
}
