use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    ArcedCredentials, Item, Player, PlayerError, PlayerEvent, PlayerId, PlayerKind, PlayerResult,
    PlayerState, PollReport, Reconciler, RemoteError, RemotePlayback, RemoteSnapshot,
    ReportSender, UserId,
};

/// A [Player] driving any [RemotePlayback], polling it while playing and
/// deriving transitions by comparing snapshots.
pub struct RemoteAdapter<R> {
    inner: Arc<AdapterInner<R>>,
    polling: Mutex<Option<JoinHandle<()>>>,
}

struct AdapterInner<R> {
    id: PlayerId,
    kind: PlayerKind,
    host: UserId,
    remote: Arc<R>,
    credentials: ArcedCredentials,
    poll_interval: Duration,
    reports: ReportSender,
    token: Mutex<Option<String>>,
    /// Held while a new token is requested, so concurrent failures cause a single refresh
    refreshing: tokio::sync::Mutex<()>,
    reconciler: Mutex<Reconciler>,
}

impl<R> RemoteAdapter<R>
where
    R: RemotePlayback,
{
    pub fn new(
        kind: PlayerKind,
        host: UserId,
        remote: Arc<R>,
        credentials: ArcedCredentials,
        poll_interval: Duration,
        reports: ReportSender,
    ) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                id: PlayerId::new(),
                kind,
                host,
                remote,
                credentials,
                poll_interval,
                reports,
                token: Default::default(),
                refreshing: Default::default(),
                reconciler: Default::default(),
            }),
            polling: Default::default(),
        }
    }

    /// The working set, in play order
    pub fn items(&self) -> Vec<Item> {
        self.inner.reconciler.lock().items().cloned().collect()
    }

    pub fn is_polling(&self) -> bool {
        self.polling.lock().is_some()
    }

    fn start_polling(&self) {
        let mut polling = self.polling.lock();

        if polling.is_none() {
            let inner = self.inner.clone();
            *polling = Some(tokio::spawn(async move { inner.poll().await }));
        }
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.polling.lock().take() {
            handle.abort();
        }
    }

    async fn issue_play(&self, keys: Vec<String>) -> PlayerResult<()> {
        let remote = self.inner.remote.clone();

        self.inner
            .with_token(move |token| {
                let remote = remote.clone();
                let keys = keys.clone();

                async move { remote.play(&token, &keys).await }
            })
            .await
    }
}

impl<R> AdapterInner<R>
where
    R: RemotePlayback,
{
    async fn current_token(&self) -> PlayerResult<String> {
        if let Some(token) = self.token.lock().clone() {
            return Ok(token);
        }

        let _guard = self.refreshing.lock().await;

        // Someone else may have fetched it while we waited
        if let Some(token) = self.token.lock().clone() {
            return Ok(token);
        }

        let access = self.credentials.token(&self.host, self.kind, false).await?;
        *self.token.lock() = Some(access.token.clone());

        Ok(access.token)
    }

    async fn refresh_token(&self, stale: &str) -> PlayerResult<String> {
        let _guard = self.refreshing.lock().await;

        if let Some(token) = self.token.lock().clone() {
            if token != stale {
                return Ok(token);
            }
        }

        debug!("Refreshing {} token for {}", self.kind.as_str(), self.host);

        let access = self.credentials.token(&self.host, self.kind, true).await?;
        *self.token.lock() = Some(access.token.clone());

        Ok(access.token)
    }

    /// Runs a remote call, refreshing the token and retrying once if it expired.
    async fn with_token<T, F, Fut>(&self, call: F) -> PlayerResult<T>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RemoteError>> + Send,
        T: Send,
    {
        let token = self.current_token().await?;

        match call(token.clone()).await {
            Err(RemoteError::Expired) => {
                let fresh = self.refresh_token(&token).await?;
                Ok(call(fresh).await?)
            }
            result => Ok(result?),
        }
    }

    async fn poll(self: Arc<Self>) {
        let mut ticks = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;

            let remote = self.remote.clone();
            let result = self
                .with_token(move |token| {
                    let remote = remote.clone();
                    async move { remote.snapshot(&token).await }
                })
                .await;

            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!("Failed polling {} player: {}", self.kind.as_str(), error);
                    continue;
                }
            };

            let report = PollReport {
                player_id: self.id,
                snapshot,
            };

            if self.reports.send(report).is_err() {
                // The session is gone
                break;
            }
        }
    }
}

#[async_trait]
impl<R> Player for RemoteAdapter<R>
where
    R: RemotePlayback,
{
    fn id(&self) -> PlayerId {
        self.inner.id
    }

    fn kind(&self) -> PlayerKind {
        self.inner.kind
    }

    async fn play(&self, items: Option<Vec<Item>>) -> PlayerResult<()> {
        let Some(items) = items else {
            let (state, keys) = {
                let reconciler = self.inner.reconciler.lock();
                (reconciler.state(), reconciler.keys())
            };

            match state {
                PlayerState::Paused => return self.resume().await,
                PlayerState::Playing => return Ok(()),
                PlayerState::Ready | PlayerState::Interrupted => {}
            }

            if keys.is_empty() {
                return Err(PlayerError::NoItems);
            }

            self.issue_play(keys).await?;
            self.inner.reconciler.lock().playing();
            self.start_polling();

            return Ok(());
        };

        if items.is_empty() {
            return Err(PlayerError::NoItems);
        }

        let keys = items.iter().map(|i| i.source_key().to_string()).collect();

        self.issue_play(keys).await?;
        self.inner.reconciler.lock().start(items);
        self.start_polling();

        Ok(())
    }

    async fn pause(&self) -> PlayerResult<()> {
        let remote = self.inner.remote.clone();

        self.inner
            .with_token(move |token| {
                let remote = remote.clone();
                async move { remote.pause(&token).await }
            })
            .await?;

        self.inner.reconciler.lock().paused();
        self.stop_polling();

        Ok(())
    }

    async fn resume(&self) -> PlayerResult<()> {
        if !self.has_items() {
            return Err(PlayerError::NoItems);
        }

        let remote = self.inner.remote.clone();

        self.inner
            .with_token(move |token| {
                let remote = remote.clone();
                async move { remote.resume(&token).await }
            })
            .await?;

        self.inner.reconciler.lock().playing();
        self.start_polling();

        Ok(())
    }

    async fn next(&self) -> PlayerResult<()> {
        if !self.has_items() {
            return Err(PlayerError::NoItems);
        }

        let remote = self.inner.remote.clone();

        self.inner
            .with_token(move |token| {
                let remote = remote.clone();
                async move { remote.skip(&token).await }
            })
            .await?;

        let has_items = {
            let mut reconciler = self.inner.reconciler.lock();
            reconciler.advance();

            // Skipping starts the next item on the remote, even when paused
            if reconciler.has_items() {
                reconciler.playing();
            }

            reconciler.has_items()
        };

        if has_items {
            self.start_polling();
        } else {
            self.stop_polling();
        }

        Ok(())
    }

    fn has_items(&self) -> bool {
        self.inner.reconciler.lock().has_items()
    }

    fn stop(&self) {
        self.stop_polling();
        self.inner.reconciler.lock().clear();
    }

    fn state(&self) -> PlayerState {
        self.inner.reconciler.lock().state()
    }

    fn reconcile(&self, snapshot: Option<RemoteSnapshot>) -> Option<PlayerEvent> {
        let (event, state, has_items) = {
            let mut reconciler = self.inner.reconciler.lock();
            let event = reconciler.apply(snapshot);
            (event, reconciler.state(), reconciler.has_items())
        };

        if !has_items {
            // Nothing left that the remote is expected to play
            self.stop_polling();
        } else if state == PlayerState::Playing {
            // The remote may still play after being told to pause
            self.start_polling();
        }

        event
    }
}

impl<R> Drop for RemoteAdapter<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.polling.lock().take() {
            handle.abort();
        }
    }
}
