use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json,
};
use qitup_collab::{NewUser, UserProfile};
use qitup_core::PlayerKind;

use crate::{
    auth::Authenticated,
    context::ServerContext,
    errors::ServerResult,
    schemas::{IdentitySchema, NewUserSchema, ValidatedJson},
    serialized::{CreatedUser, ToSerialized},
    Router,
};

async fn create_user(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewUserSchema>,
) -> ServerResult<(StatusCode, Json<CreatedUser>)> {
    let user = context
        .collab
        .database()
        .create_user(NewUser {
            display_name: body.display_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.to_serialized())))
}

async fn me(Authenticated(user): Authenticated) -> Json<UserProfile> {
    Json(user.to_serialized())
}

async fn set_identity(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(provider): Path<PlayerKind>,
    ValidatedJson(body): ValidatedJson<IdentitySchema>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .database()
        .set_identity(&user.id, provider, body.token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user))
        .route("/me", get(me))
        .route("/me/identities/:provider", put(set_identity))
}
