mod auth;
mod context;
mod errors;
mod gateway;
mod parties;
mod schemas;
mod serialized;
mod users;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use log::info;
use qitup_collab::Collab;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use errors::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("QITUP_SERVER_PORT must be a port number, got {0}")]
    InvalidPort(String),
    #[error("Could not listen: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the server listens and how clients reach it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Base of the connect urls handed to clients
    pub public_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, StartError> {
        let port = match env::var("QITUP_SERVER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| StartError::InvalidPort(value))?,
            Err(_) => DEFAULT_PORT,
        };

        let public_url = env::var("QITUP_PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("ws://localhost:{}", port));

        Ok(Self { port, public_url })
    }

    /// The url a client connects to with a connect token
    pub fn connect_url(&self, token: &str) -> String {
        format!("{}/v1/party/connect/{}", self.public_url, token)
    }
}

/// Starts the qitup server
pub async fn run_server(collab: Arc<Collab>, config: ServerConfig) -> Result<(), StartError> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext {
        collab,
        config: Arc::new(config),
    };

    let version_one_router = Router::new()
        .nest("/users", users::router())
        .nest("/party", parties::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, root_router.into_make_service()).await?;
    Ok(())
}
