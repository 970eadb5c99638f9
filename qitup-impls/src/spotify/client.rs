use async_trait::async_trait;
use log::debug;
use qitup_core::{RemoteError, RemotePlayback, RemoteSnapshot};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Talks to the Spotify Web API player endpoints on behalf of a token holder.
pub struct SpotifyClient {
    client: Client,
    base_url: String,
    /// Target device, or the user's active device if unset
    device_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlayBody<'a> {
    uris: &'a [String],
    offset: PlayOffset<'a>,
}

#[derive(Debug, Serialize)]
struct PlayOffset<'a> {
    uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlaybackState {
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<PlaybackItem>,
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    uri: String,
}

impl SpotifyClient {
    pub const DEFAULT_API_URL: &'static str = "https://api.spotify.com/v1";

    pub fn new<S>(base_url: S, device_id: Option<String>) -> Self
    where
        S: Into<String>,
    {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_id,
        }
    }

    fn request(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        let builder = builder.bearer_auth(token);

        match &self.device_id {
            Some(id) => builder.query(&[("device_id", id)]),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(error_for_status(status, message))
    }
}

fn error_for_status(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Expired,
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited,
        status => RemoteError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_snapshot(body: &str) -> Result<RemoteSnapshot, RemoteError> {
    let state: PlaybackState =
        serde_json::from_str(body).map_err(|e| RemoteError::Request(e.to_string()))?;

    Ok(RemoteSnapshot {
        playing: state.is_playing,
        item: state.item.map(|i| i.uri),
        progress: state.progress_ms.unwrap_or_default(),
    })
}

#[async_trait]
impl RemotePlayback for SpotifyClient {
    async fn play(&self, token: &str, keys: &[String]) -> Result<(), RemoteError> {
        let Some(first) = keys.first() else {
            return Ok(());
        };

        let body = PlayBody {
            uris: keys,
            offset: PlayOffset { uri: first },
        };

        let builder = self.client.put(self.url("/me/player/play")).json(&body);
        self.send(self.request(builder, token)).await?;

        Ok(())
    }

    async fn resume(&self, token: &str) -> Result<(), RemoteError> {
        let builder = self
            .client
            .put(self.url("/me/player/play"))
            .header(reqwest::header::CONTENT_LENGTH, 0);

        self.send(self.request(builder, token)).await?;
        Ok(())
    }

    async fn pause(&self, token: &str) -> Result<(), RemoteError> {
        let builder = self
            .client
            .put(self.url("/me/player/pause"))
            .header(reqwest::header::CONTENT_LENGTH, 0);

        self.send(self.request(builder, token)).await?;
        Ok(())
    }

    async fn skip(&self, token: &str) -> Result<(), RemoteError> {
        let builder = self
            .client
            .post(self.url("/me/player/next"))
            .header(reqwest::header::CONTENT_LENGTH, 0);

        self.send(self.request(builder, token)).await?;
        Ok(())
    }

    async fn snapshot(&self, token: &str) -> Result<Option<RemoteSnapshot>, RemoteError> {
        let builder = self.client.get(self.url("/me/player"));
        let response = self.send(self.request(builder, token)).await?;

        // No active device
        if response.status() == StatusCode::NO_CONTENT {
            debug!("Spotify reports no active playback");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        if body.trim().is_empty() {
            return Ok(None);
        }

        parse_snapshot(&body).map(Some)
    }
}
