use std::{sync::Arc, time::Duration};

use qitup_core::{
    ArcedCredentials, ArcedPlayer, PlayerFactory, PlayerKind, RemoteAdapter, ReportSender, UserId,
};

use crate::SpotifyClient;

/// Creates Spotify players that share one HTTP client.
pub struct SpotifyPlayerFactory {
    client: Arc<SpotifyClient>,
    credentials: ArcedCredentials,
    poll_interval: Duration,
}

impl SpotifyPlayerFactory {
    pub fn new(client: SpotifyClient, credentials: ArcedCredentials, poll_interval: Duration) -> Self {
        Self {
            client: Arc::new(client),
            credentials,
            poll_interval,
        }
    }
}

impl PlayerFactory for SpotifyPlayerFactory {
    fn kind(&self) -> PlayerKind {
        PlayerKind::Spotify
    }

    fn create(&self, host: &UserId, reports: ReportSender) -> ArcedPlayer {
        Arc::new(RemoteAdapter::new(
            PlayerKind::Spotify,
            host.clone(),
            self.client.clone(),
            self.credentials.clone(),
            self.poll_interval,
            reports,
        ))
    }
}
