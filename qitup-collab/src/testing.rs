//! Fakes shared by the tests of this crate.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use qitup_core::{
    AccessToken, ArcedPlayer, Config, CredentialError, Credentials, Item, ItemSource, PlayerFactory,
    PlayerKind, PollReport, RemoteAdapter, RemoteError, RemotePlayback, RemoteSnapshot,
    ReportSender, UserId,
};
use serde_json::Value;

use crate::{
    ClientTransport, Collab, Database, MemoryDatabase, MemoryStore, NewUser, PartyConnect,
    PartySettings, Players, Store, StoreError, StoreResult, TransportError, UserData,
};

pub fn track(uri: &str) -> Item {
    Item::new(ItemSource::SpotifyTrack { uri: uri.into() })
}

/// A [MemoryStore] that can be told to fail every operation.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn push_head(&self, key: &str, value: String) -> StoreResult<usize> {
        self.check()?;
        self.inner.push_head(key, value).await
    }

    async fn pop_tail(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.pop_tail(key).await
    }

    async fn range(&self, key: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.range(key).await
    }

    async fn set_index(&self, key: &str, index: i64, value: String) -> StoreResult<()> {
        self.check()?;
        self.inner.set_index(key, index, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> StoreResult<bool> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.take(key).await
    }
}

/// A remote player that accepts everything and records what it was told.
#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<String>>,
    snapshots: Mutex<VecDeque<RemoteSnapshot>>,
    polls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeRemote {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Queues a snapshot for an upcoming poll
    pub fn will_report(&self, snapshot: RemoteSnapshot) {
        self.snapshots.lock().push_back(snapshot);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Makes every command fail as if the service was unreachable
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: String) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Request("connection refused".into()));
        }

        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl RemotePlayback for FakeRemote {
    async fn play(&self, _token: &str, keys: &[String]) -> Result<(), RemoteError> {
        self.record(format!("play:{}", keys.join(",")))
    }

    async fn resume(&self, _token: &str) -> Result<(), RemoteError> {
        self.record("resume".into())
    }

    async fn pause(&self, _token: &str) -> Result<(), RemoteError> {
        self.record("pause".into())
    }

    async fn skip(&self, _token: &str) -> Result<(), RemoteError> {
        self.record("skip".into())
    }

    async fn snapshot(&self, _token: &str) -> Result<Option<RemoteSnapshot>, RemoteError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshots.lock().pop_front())
    }
}

struct StaticCredentials;

#[async_trait]
impl Credentials for StaticCredentials {
    async fn token(
        &self,
        user: &UserId,
        _provider: PlayerKind,
        refresh: bool,
    ) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken {
            token: format!("token-{}", user),
            refreshed: refresh,
        })
    }
}

/// A player created by [FakeFactory], with the channel it reports to.
#[derive(Clone)]
pub struct CreatedPlayer {
    pub host: UserId,
    pub player: ArcedPlayer,
    pub reports: ReportSender,
}

impl CreatedPlayer {
    /// Delivers a snapshot as if the player had polled it.
    pub fn report(&self, snapshot: RemoteSnapshot) {
        let _ = self.reports.send(PollReport {
            player_id: self.player.id(),
            snapshot: Some(snapshot),
        });
    }
}

/// Creates remote adapters over one shared [FakeRemote] and remembers them.
#[derive(Clone, Default)]
pub struct FakeFactory {
    remote: Arc<FakeRemote>,
    created: Arc<Mutex<Vec<CreatedPlayer>>>,
}

impl FakeFactory {
    pub fn remote(&self) -> &FakeRemote {
        &self.remote
    }

    pub fn created(&self) -> Vec<CreatedPlayer> {
        self.created.lock().clone()
    }

    pub fn last(&self) -> CreatedPlayer {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no player was created")
    }
}

impl PlayerFactory for FakeFactory {
    fn kind(&self) -> PlayerKind {
        PlayerKind::Spotify
    }

    fn create(&self, host: &UserId, reports: ReportSender) -> ArcedPlayer {
        let player: ArcedPlayer = Arc::new(RemoteAdapter::new(
            PlayerKind::Spotify,
            host.clone(),
            self.remote.clone(),
            Arc::new(StaticCredentials),
            Duration::from_secs(5),
            reports.clone(),
        ));

        self.created.lock().push(CreatedPlayer {
            host: host.clone(),
            player: player.clone(),
            reports,
        });

        player
    }
}

/// A client connection that keeps every message it was sent.
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<Value>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// The `type` of every message received, in order
    pub fn types(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m["type"].as_str().map(String::from))
            .collect()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.messages.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ClientTransport for RecordingTransport {
    fn send(&self, payload: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let value = serde_json::from_str(&payload).map_err(|_| TransportError::Closed)?;
        self.messages.lock().push(value);

        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A collab system over in-memory storage and fake players.
pub struct Harness {
    pub collab: Collab,
    pub database: Arc<MemoryDatabase>,
    pub store: Arc<FlakyStore>,
    pub factory: FakeFactory,
}

impl Harness {
    pub fn new() -> Self {
        let database = Arc::new(MemoryDatabase::new());
        let store = Arc::new(FlakyStore::default());
        let factory = FakeFactory::default();
        let players = Players::new().register(factory.clone());

        let collab = Collab::new(Config::default(), database.clone(), store.clone(), players);

        Self {
            collab,
            database,
            store,
            factory,
        }
    }

    /// Builds another collab system over the same storage, as after a restart.
    pub fn restarted(&self) -> Collab {
        let players = Players::new().register(self.factory.clone());

        Collab::new(
            Config::default(),
            self.database.clone(),
            self.store.clone(),
            players,
        )
    }

    pub async fn user(&self, name: &str) -> UserData {
        self.database
            .create_user(NewUser {
                display_name: name.into(),
            })
            .await
            .unwrap()
    }

    pub async fn party(&self, host: &UserData, settings: PartySettings) -> PartyConnect {
        self.collab
            .parties
            .create_party(host, "Party".into(), format!("code-{}", host.id), settings)
            .await
            .unwrap()
    }
}
