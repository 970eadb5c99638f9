use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use qitup_collab::{DatabaseError, PartyError, QueueError, SessionError, TokenError};
use qitup_core::PlayerError;
use serde_json::json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Party does not exist")]
    PartyNotFound,
    #[error("{resource} does not exist")]
    NotFound { resource: &'static str },
    #[error("A party with join code {0} already exists")]
    DuplicateParty(String),
    #[error("A connect url was issued moments ago, use it or try again shortly")]
    AlreadyIssued,
    #[error("Connect url expired or was already used")]
    UrlExpired,
    #[error("Queue is empty")]
    EmptyQueue,
    #[error("Playback was taken over elsewhere, play to take it back")]
    Interrupted,
    #[error("Only the host of the party can do this")]
    NotHost,
    #[error("Not a member of the party")]
    NotMember,
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    InvalidBody(String),
    #[error("Player failed: {0}")]
    Player(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PartyNotFound => "party_not_found",
            Self::NotFound { .. } => "not_found",
            Self::DuplicateParty(_) => "duplicate_party",
            Self::AlreadyIssued => "already_issued",
            Self::UrlExpired => "url_expired",
            Self::EmptyQueue => "empty_queue",
            Self::Interrupted => "interrupted",
            Self::NotHost => "not_host",
            Self::NotMember => "not_member",
            Self::Unsupported(_) => "unsupported_item",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidBody(_) => "invalid_body",
            Self::Player(_) => "player_error",
            Self::Unknown(_) => "internal",
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::PartyNotFound | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::DuplicateParty(_) | Self::EmptyQueue | Self::Interrupted => StatusCode::CONFLICT,
            Self::AlreadyIssued | Self::NotHost | Self::NotMember => StatusCode::FORBIDDEN,
            Self::UrlExpired => StatusCode::GONE,
            Self::Unsupported(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Player(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "msg": self.to_string(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource: "party", ..
            } => Self::PartyNotFound,
            DatabaseError::NotFound { resource, .. } => Self::NotFound { resource },
            DatabaseError::Conflict {
                resource: "party",
                value,
                ..
            } => Self::DuplicateParty(value),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::AlreadyIssued => Self::AlreadyIssued,
            TokenError::NotFound => Self::UrlExpired,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<QueueError> for ServerError {
    fn from(value: QueueError) -> Self {
        Self::Unknown(value.to_string())
    }
}

impl From<PlayerError> for ServerError {
    fn from(value: PlayerError) -> Self {
        match value {
            PlayerError::NoItems => Self::EmptyQueue,
            e => Self::Player(e.to_string()),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::EmptyQueue => Self::EmptyQueue,
            SessionError::Interrupted => Self::Interrupted,
            // The party was closed while the request was in flight
            SessionError::Closed => Self::PartyNotFound,
            e @ SessionError::NoAdapter(_) => Self::Unsupported(e.to_string()),
            SessionError::Player(e) => e.into(),
            SessionError::Queue(e) => e.into(),
            SessionError::Database(e) => e.into(),
        }
    }
}

impl From<PartyError> for ServerError {
    fn from(value: PartyError) -> Self {
        match value {
            PartyError::NotFound => Self::PartyNotFound,
            PartyError::NotHost => Self::NotHost,
            PartyError::NotMember => Self::NotMember,
            PartyError::Token(e) => e.into(),
            PartyError::Session(e) => e.into(),
            PartyError::Queue(e) => e.into(),
            PartyError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_codes() {
        let cases: Vec<(ServerError, &str, StatusCode)> = vec![
            (
                PartyError::NotFound.into(),
                "party_not_found",
                StatusCode::NOT_FOUND,
            ),
            (
                DatabaseError::Conflict {
                    resource: "party",
                    field: "join_code",
                    value: "ABC".into(),
                }
                .into(),
                "duplicate_party",
                StatusCode::CONFLICT,
            ),
            (
                PartyError::Token(TokenError::AlreadyIssued).into(),
                "already_issued",
                StatusCode::FORBIDDEN,
            ),
            (
                PartyError::Token(TokenError::NotFound).into(),
                "url_expired",
                StatusCode::GONE,
            ),
            (
                PartyError::Session(SessionError::EmptyQueue).into(),
                "empty_queue",
                StatusCode::CONFLICT,
            ),
            (
                SessionError::Player(PlayerError::NoItems).into(),
                "empty_queue",
                StatusCode::CONFLICT,
            ),
            (
                SessionError::Interrupted.into(),
                "interrupted",
                StatusCode::CONFLICT,
            ),
            (PartyError::NotHost.into(), "not_host", StatusCode::FORBIDDEN),
        ];

        for (error, code, status) in cases {
            assert_eq!(error.code(), code);
            assert_eq!(error.as_status_code(), status);
        }
    }
}
