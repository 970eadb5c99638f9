use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use qitup_collab::{DatabaseError, UserData};

use crate::{errors::ServerError, ServerContext};

/// The user a request was made by, resolved from its bearer token
pub struct Authenticated(pub UserData);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or(ServerError::Unauthorized("Missing authorization"))?;

        let token = match header.split_ascii_whitespace().collect::<Vec<_>>()[..] {
            ["Bearer", token] => token,
            _ => return Err(ServerError::Unauthorized("Authorization must be Bearer")),
        };

        let user = context
            .collab
            .database()
            .user_by_token(token)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => ServerError::Unauthorized("Unknown user token"),
                e => e.into(),
            })?;

        Ok(Self(user))
    }
}
