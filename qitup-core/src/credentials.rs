use async_trait::async_trait;
use thiserror::Error;

use crate::{PlayerKind, UserId};

pub type ArcedCredentials = std::sync::Arc<dyn Credentials>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// True if the token was renewed by this request
    pub refreshed: bool,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("User {user} has no {provider} identity")]
    Missing { user: UserId, provider: &'static str },
    #[error("Credential lookup failed: {0}")]
    Internal(String),
}

/// Hands out access tokens for a user's streaming-provider identity.
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Returns the user's token for a provider. With `refresh` set, a new token is requested.
    async fn token(
        &self,
        user: &UserId,
        provider: PlayerKind,
        refresh: bool,
    ) -> Result<AccessToken, CredentialError>;
}
