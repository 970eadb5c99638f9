use base64::{engine::general_purpose::URL_SAFE, Engine};
use log::debug;
use qitup_core::Config;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::{ArcedStore, PartyData, PrimaryKey, StoreError};

pub type TokenResult<T> = Result<T, TokenError>;

#[derive(Debug, Error)]
pub enum TokenError {
    /// A live token already exists for this user and party
    #[error("Connect token is already issued")]
    AlreadyIssued,
    /// The token never existed, expired, or was already redeemed
    #[error("Connect token is not valid")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Connect token could not be read: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// What a redeemed connect token grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectGrant {
    pub party_id: PrimaryKey,
    pub user_id: PrimaryKey,
}

/// Issues and redeems the single-use tokens that gate client connections.
pub struct ConnectTokens {
    config: Config,
    store: ArcedStore,
}

impl ConnectTokens {
    pub fn new(config: &Config, store: ArcedStore) -> Self {
        Self {
            config: config.clone(),
            store,
        }
    }

    /// The token for a user and join code. The same pair always yields the same token.
    pub fn token_for(user_id: &str, join_code: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(user_id.as_bytes());
        hasher.update(join_code.as_bytes());

        URL_SAFE.encode(hasher.finalize())
    }

    /// Issues a token binding the user to the party, valid for the configured time.
    pub async fn issue(&self, user_id: &str, party: &PartyData) -> TokenResult<String> {
        let token = Self::token_for(user_id, &party.join_code);
        let grant = serde_json::to_string(&ConnectGrant {
            party_id: party.id.clone(),
            user_id: user_id.to_string(),
        })?;

        let stored = self
            .store
            .set_if_absent(
                &self.config.connect_token_key(&token),
                grant,
                self.config.connect_token_ttl,
            )
            .await?;

        if !stored {
            return Err(TokenError::AlreadyIssued);
        }

        debug!("Issued connect token for {} to party {}", user_id, party.id);
        Ok(token)
    }

    /// Redeems a token. Only the first redemption of a live token succeeds.
    pub async fn redeem(&self, token: &str) -> TokenResult<ConnectGrant> {
        let raw = self
            .store
            .take(&self.config.connect_token_key(token))
            .await?
            .ok_or(TokenError::NotFound)?;

        Ok(serde_json::from_str(&raw)?)
    }
}
