use async_trait::async_trait;
use qitup_core::{AccessToken, CredentialError, Credentials, PlayerKind, UserId};

use crate::{ArcedDatabase, DatabaseError};

/// Serves provider tokens from the identities stored on each user.
///
/// Tokens are renewed outside of this process, so a refresh returns whatever
/// the user most recently stored.
pub struct IdentityCredentials {
    database: ArcedDatabase,
}

impl IdentityCredentials {
    pub fn new(database: ArcedDatabase) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Credentials for IdentityCredentials {
    async fn token(
        &self,
        user: &UserId,
        provider: PlayerKind,
        refresh: bool,
    ) -> Result<AccessToken, CredentialError> {
        let user_data = self.database.user_by_id(user).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => CredentialError::Missing {
                user: user.clone(),
                provider: provider.as_str(),
            },
            e => CredentialError::Internal(e.to_string()),
        })?;

        let token = user_data
            .identities
            .get(&provider)
            .cloned()
            .ok_or_else(|| CredentialError::Missing {
                user: user.clone(),
                provider: provider.as_str(),
            })?;

        Ok(AccessToken {
            token,
            refreshed: refresh,
        })
    }
}
