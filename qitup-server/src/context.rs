use std::sync::Arc;

use axum::extract::FromRef;
use qitup_collab::Collab;

use crate::ServerConfig;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub config: Arc<ServerConfig>,
}
