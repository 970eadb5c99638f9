use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json,
};
use log::info;
use qitup_collab::{random_string, PartyData, PartySettings, Session};
use validator::Validate;

use crate::{
    auth::Authenticated,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    gateway,
    schemas::{JoinCodeQuery, NewPartySchema, PushSchema, TransferHostSchema, ValidatedJson},
    serialized::PartyJoin,
    Router,
};

const JOIN_CODE_LENGTH: usize = 6;

fn validated(query: JoinCodeQuery) -> ServerResult<JoinCodeQuery> {
    query
        .validate()
        .map_err(|e| ServerError::InvalidBody(e.to_string()))?;

    Ok(query)
}

async fn party_by_code(
    _user: Authenticated,
    State(context): State<ServerContext>,
    Query(query): Query<JoinCodeQuery>,
) -> ServerResult<Json<PartyData>> {
    let query = validated(query)?;
    let party = context.collab.parties.party_by_join_code(&query.code).await?;

    Ok(Json(party))
}

async fn create_party(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewPartySchema>,
) -> ServerResult<(StatusCode, Json<PartyJoin>)> {
    let join_code = body
        .join_code
        .unwrap_or_else(|| random_string(JOIN_CODE_LENGTH).to_uppercase());

    let settings = PartySettings {
        timeout_secs: body.timeout_secs,
    };

    let connect = context
        .collab
        .parties
        .create_party(&user, body.name, join_code, settings)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PartyJoin::new(connect, &context.config)),
    ))
}

async fn join_party(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Query(query): Query<JoinCodeQuery>,
) -> ServerResult<Json<PartyJoin>> {
    let query = validated(query)?;
    let connect = context.collab.parties.join(&user, &query.code).await?;

    Ok(Json(PartyJoin::new(connect, &context.config)))
}

async fn leave_party(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
) -> ServerResult<StatusCode> {
    context.collab.parties.leave(&user.id, &party_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn transfer_host(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
    ValidatedJson(body): ValidatedJson<TransferHostSchema>,
) -> ServerResult<StatusCode> {
    context
        .collab
        .parties
        .transfer_host(&party_id, &user.id, &body.user_id)
        .await?;

    info!("{} handed party {} to {}", user.display_name, party_id, body.user_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn member_session(
    context: &ServerContext,
    party_id: &str,
    user_id: &str,
) -> ServerResult<Session> {
    let session = context
        .collab
        .parties
        .member_session(party_id, user_id)
        .await?;

    Ok(session)
}

async fn push(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
    ValidatedJson(body): ValidatedJson<PushSchema>,
) -> ServerResult<StatusCode> {
    let session = member_session(&context, &party_id, &user.id).await?;
    session.push(body.item, user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn play(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
) -> ServerResult<StatusCode> {
    member_session(&context, &party_id, &user.id)
        .await?
        .play()
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn pause(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
) -> ServerResult<StatusCode> {
    member_session(&context, &party_id, &user.id)
        .await?
        .pause()
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn next(
    Authenticated(user): Authenticated,
    State(context): State<ServerContext>,
    Path(party_id): Path<String>,
) -> ServerResult<StatusCode> {
    member_session(&context, &party_id, &user.id)
        .await?
        .next()
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(party_by_code).post(create_party))
        .route("/join", get(join_party))
        .route("/connect/:token", get(gateway::connect))
        .route("/:id/leave", post(leave_party))
        .route("/:id/host", post(transfer_host))
        .route("/:id/push", post(push))
        .route("/:id/player/play", post(play))
        .route("/:id/player/pause", post(pause))
        .route("/:id/player/next", post(next))
}
