use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use qitup_core::Item;
use serde::{de::DeserializeOwned, Deserialize};
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUserSchema {
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentitySchema {
    /// The provider's access token
    #[validate(length(min = 1, max = 1024))]
    pub token: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPartySchema {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Generated if missing
    #[validate(length(min = 4, max = 16))]
    pub join_code: Option<String>,
    #[validate(range(min = 60, max = 86400))]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct JoinCodeQuery {
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferHostSchema {
    #[validate(length(min = 1))]
    pub user_id: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSchema {
    pub item: Item,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ServerError::InvalidBody(e.body_text()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::InvalidBody(e.to_string()))?;

        Ok(Self(extracted_json.0))
    }
}
