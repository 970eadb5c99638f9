use std::sync::Arc;

use async_trait::async_trait;
use qitup_core::PlayerKind;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type ArcedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult<T> {
    /// Turns a [DatabaseError::NotFound] into `None`
    fn optional(self) -> Result<Option<T>>;
}

impl<T> DatabaseResult<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewParty {
    pub name: String,
    pub join_code: String,
    pub settings: PartySettings,
    /// The host of the new party
    pub host_id: PrimaryKey,
}

/// Represents a type that can fetch qitup data from a database
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    async fn user_by_token(&self, token: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    /// Stores the access token of a user's streaming-provider identity
    async fn set_identity(&self, user_id: &str, provider: PlayerKind, token: String) -> Result<()>;

    async fn party_by_id(&self, party_id: &str) -> Result<PartyData>;
    async fn party_by_join_code(&self, join_code: &str) -> Result<PartyData>;
    async fn list_parties(&self) -> Result<Vec<PartyData>>;
    async fn create_party(&self, new_party: NewParty) -> Result<PartyData>;
    /// Adds an attendee. Hosts and existing attendees are left as they are.
    async fn add_attendee(&self, party_id: &str, user_id: &str) -> Result<PartyData>;
    async fn remove_attendee(&self, party_id: &str, user_id: &str) -> Result<PartyData>;
    /// Makes a user the host. The new host leaves the attendees and the previous host joins them.
    async fn transfer_host(&self, party_id: &str, user_id: &str) -> Result<PartyData>;
    async fn delete_party(&self, party_id: &str) -> Result<()>;
}
