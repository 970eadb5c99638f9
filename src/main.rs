use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info};
use qitup_collab::{Collab, IdentityCredentials, MemoryDatabase, MemoryStore, Players};
use qitup_core::Config;
use qitup_impls::{SpotifyClient, SpotifyPlayerFactory};
use qitup_server::{run_server, ServerConfig, StartError};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum QitupError {
    #[error("Could not start server: {0}")]
    Server(#[from] StartError),
}

impl QitupError {
    fn hint(&self) -> String {
        match self {
            QitupError::Server(StartError::InvalidPort(_)) => {
                "Set QITUP_SERVER_PORT to a number between 1 and 65535, or unset it to use 9050."
                    .to_string()
            }
            QitupError::Server(StartError::Io(_)) => {
                "Make sure nothing else is listening on the configured port, then try again."
                    .to_string()
            }
        }
    }
}

async fn run() -> Result<(), QitupError> {
    let server_config = ServerConfig::from_env()?;
    let config = Config::default();

    let database = Arc::new(MemoryDatabase::new());
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(IdentityCredentials::new(database.clone()));

    let api_url =
        env::var("SPOTIFY_API_URL").unwrap_or_else(|_| SpotifyClient::DEFAULT_API_URL.to_string());
    let device_id = env::var("SPOTIFY_DEVICE_ID").ok();

    let players = Players::new().register(SpotifyPlayerFactory::new(
        SpotifyClient::new(api_url, device_id),
        credentials,
        config.poll_interval,
    ));

    let collab = Collab::new(config, database, store, players);

    info!("Initialized successfully.");
    run_server(Arc::new(collab), server_config).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", e);
    }

    if let Err(error) = run().await {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "qitup failed to start!".bold().red()
        );
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
