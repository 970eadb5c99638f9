use std::{collections::HashMap, time::Duration};

use log::{debug, error, info, warn};
use qitup_core::{
    ArcedPlayer, Id, Item, PlayerError, PlayerEvent, PlayerKind, PlayerState, PollReport,
    ReportReceiver, ReportSender, UserId,
};
use thiserror::Error;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    oneshot,
};

use crate::{
    CollabContext, DatabaseError, PartyData, PrimaryKey, Queue, QueueError, QueueSnapshot,
    SessionMessage,
};

use super::{ClientHandle, ConnectionId, InactivityTimer, TimerStats};

pub type SessionId = Id<Session>;
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Queue is empty")]
    EmptyQueue,
    #[error("Playback was taken over elsewhere, play to take it back")]
    Interrupted,
    #[error("Party session is closed")]
    Closed,
    #[error("No {0} player is available")]
    NoAdapter(&'static str),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SessionError {
    /// A machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyQueue => "empty_queue",
            Self::Interrupted => "interrupted",
            Self::Closed => "party_closed",
            Self::NoAdapter(_) => "unsupported_item",
            Self::Player(_) => "player_error",
            Self::Queue(_) => "queue_error",
            Self::Database(_) => "internal",
        }
    }
}

/// A point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: PlayerState,
    /// The kind of the player currently driven, if any
    pub active: Option<PlayerKind>,
    /// How many players are instantiated
    pub players: usize,
    pub clients: Vec<UserId>,
    pub queue_length: usize,
    pub timer: TimerStats,
}

type Reply<T> = oneshot::Sender<SessionResult<T>>;

enum Command {
    Connect { client: ClientHandle, reply: Reply<()> },
    Disconnect { connection_id: ConnectionId },
    Push { item: Item, by: UserId, reply: Reply<()> },
    Play { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Next { reply: Reply<()> },
    AttendeesChanged { reply: Reply<()> },
    TransferHost { to: UserId, reply: Reply<()> },
    Queue { reply: Reply<QueueSnapshot> },
    Party { reply: Reply<PartyData> },
    Status { reply: Reply<SessionStatus> },
    Close { reply: Option<oneshot::Sender<()>> },
}

/// A handle to the worker that owns a party's live state.
///
/// Every operation is sent to the worker and applied in order, one at a time,
/// together with the reports of the party's players.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    party_id: PrimaryKey,
    commands: UnboundedSender<Command>,
}

impl Session {
    /// Starts a worker for the party and returns its handle.
    pub(crate) fn spawn(context: &CollabContext, party: PartyData, queue: Queue) -> Self {
        let (commands_sender, commands) = unbounded_channel();
        let (reports_sender, reports) = unbounded_channel();
        let (fired_sender, fired) = unbounded_channel();

        let timeout = party
            .settings
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(context.config.default_party_timeout);

        let session = Self {
            id: SessionId::new(),
            party_id: party.id.clone(),
            commands: commands_sender,
        };

        let mut worker = SessionWorker {
            id: session.id,
            context: context.clone(),
            party,
            queue,
            players: Default::default(),
            active: None,
            state: PlayerState::Ready,
            clients: Default::default(),
            timer: InactivityTimer::new(timeout, fired_sender),
            commands,
            reports_sender,
            reports,
            fired,
        };

        // Nothing is playing yet
        worker.timer.arm();

        tokio::spawn(worker.run());
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    async fn request<T, F>(&self, command: F) -> SessionResult<T>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(command(reply))
            .map_err(|_| SessionError::Closed)?;

        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Attaches a client. It is greeted and the others are told it became active.
    pub async fn client_connected(&self, client: ClientHandle) -> SessionResult<()> {
        self.request(|reply| Command::Connect { client, reply })
            .await
    }

    /// Detaches a client. Connections that were already replaced are ignored.
    pub fn client_disconnected(&self, connection_id: ConnectionId) {
        let _ = self.commands.send(Command::Disconnect { connection_id });
    }

    /// Adds an item to the end of the queue on behalf of a user.
    pub async fn push(&self, item: Item, by: UserId) -> SessionResult<()> {
        self.request(|reply| Command::Push { item, by, reply }).await
    }

    pub async fn play(&self) -> SessionResult<()> {
        self.request(|reply| Command::Play { reply }).await
    }

    pub async fn pause(&self) -> SessionResult<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn next(&self) -> SessionResult<()> {
        self.request(|reply| Command::Next { reply }).await
    }

    /// Reloads the party's members and sends them to every client.
    pub async fn attendees_changed(&self) -> SessionResult<()> {
        self.request(|reply| Command::AttendeesChanged { reply })
            .await
    }

    /// Drops every player of the previous host and notifies the new one.
    pub async fn transfer_host(&self, to: UserId) -> SessionResult<()> {
        self.request(|reply| Command::TransferHost { to, reply })
            .await
    }

    pub async fn queue(&self) -> SessionResult<QueueSnapshot> {
        self.request(|reply| Command::Queue { reply }).await
    }

    pub async fn party(&self) -> SessionResult<PartyData> {
        self.request(|reply| Command::Party { reply }).await
    }

    pub async fn status(&self) -> SessionResult<SessionStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Closes the party and waits for the teardown to finish.
    pub async fn close(&self) {
        let (reply, done) = oneshot::channel();

        if self
            .commands
            .send(Command::Close { reply: Some(reply) })
            .is_ok()
        {
            let _ = done.await;
        }
    }
}

struct SessionWorker {
    id: SessionId,
    context: CollabContext,
    party: PartyData,
    queue: Queue,
    players: HashMap<PlayerKind, ArcedPlayer>,
    active: Option<PlayerKind>,
    state: PlayerState,
    clients: HashMap<UserId, ClientHandle>,
    timer: InactivityTimer,
    commands: UnboundedReceiver<Command>,
    reports_sender: ReportSender,
    reports: ReportReceiver,
    fired: UnboundedReceiver<u64>,
}

impl SessionWorker {
    async fn run(mut self) {
        info!(
            "Party {} is live with {} queued items",
            self.party.id,
            self.queue.len()
        );

        let mut waiters = vec![];

        loop {
            tokio::select! {
                biased;

                Some(report) = self.reports.recv() => self.handle_report(report).await,
                command = self.commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        waiters.extend(reply);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(generation) = self.fired.recv() => {
                    if self.timer.is_current(generation) {
                        info!("Party {} timed out", self.party.id);
                        break;
                    }
                }
            }
        }

        self.teardown(waiters).await;
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { client, reply } => {
                self.client_connected(client);
                let _ = reply.send(Ok(()));
            }
            Command::Disconnect { connection_id } => self.client_disconnected(connection_id),
            Command::Push { item, by, reply } => {
                let _ = reply.send(self.push(item, by).await);
            }
            Command::Play { reply } => {
                let _ = reply.send(self.play().await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Command::Next { reply } => {
                let _ = reply.send(self.next().await);
            }
            Command::AttendeesChanged { reply } => {
                let _ = reply.send(self.attendees_changed().await);
            }
            Command::TransferHost { to, reply } => {
                let _ = reply.send(self.transfer_host(to).await);
            }
            Command::Queue { reply } => {
                let _ = reply.send(Ok(self.queue.snapshot()));
            }
            Command::Party { reply } => {
                let _ = reply.send(Ok(self.party.clone()));
            }
            Command::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
            Command::Close { .. } => {}
        }
    }

    fn status(&self) -> SessionStatus {
        let mut clients: Vec<_> = self.clients.keys().cloned().collect();
        clients.sort();

        SessionStatus {
            state: self.state,
            active: self.active,
            players: self.players.len(),
            clients,
            queue_length: self.queue.len(),
            timer: self.timer.stats(),
        }
    }

    fn broadcast(&mut self, message: &SessionMessage) {
        self.clients.retain(|user_id, client| match client.send(message) {
            Ok(()) => true,
            Err(error) => {
                debug!("Dropping client {} of {}: {}", user_id, self.party.id, error);
                false
            }
        });
    }

    fn broadcast_queue(&mut self) {
        let message = SessionMessage::QueueChange {
            queue: self.queue.snapshot(),
        };

        self.broadcast(&message);
    }

    fn client_connected(&mut self, client: ClientHandle) {
        info!(
            "User {} connected to party {} with {} other active attendees",
            client.user_id,
            self.party.id,
            self.clients.len()
        );

        self.broadcast(&SessionMessage::AttendeeActive {
            user: client.user_id.clone(),
        });

        let hello = SessionMessage::Hello {
            party: self.party.clone(),
            queue: self.queue.snapshot(),
            state: self.state,
        };

        if client.send(&hello).is_err() {
            return;
        }

        if let Some(previous) = self.clients.insert(client.user_id.clone(), client) {
            previous.close();
        }
    }

    fn client_disconnected(&mut self, connection_id: ConnectionId) {
        let Some(user_id) = self
            .clients
            .iter()
            .find(|(_, c)| c.id == connection_id)
            .map(|(user_id, _)| user_id.clone())
        else {
            return;
        };

        self.clients.remove(&user_id);

        info!(
            "User {} left party {} with {} other active attendees",
            user_id,
            self.party.id,
            self.clients.len()
        );

        self.broadcast(&SessionMessage::AttendeeOffline { user: user_id });
    }

    async fn push(&mut self, mut item: Item, by: UserId) -> SessionResult<()> {
        item.stamp(by);
        self.queue.push(item).await?;
        self.broadcast_queue();

        Ok(())
    }

    fn active_player(&self) -> Option<ArcedPlayer> {
        self.active.and_then(|kind| self.players.get(&kind).cloned())
    }

    fn player_for(&mut self, kind: PlayerKind) -> SessionResult<ArcedPlayer> {
        if let Some(player) = self.players.get(&kind) {
            return Ok(player.clone());
        }

        let player = self
            .context
            .players
            .create(kind, &self.party.host.id, self.reports_sender.clone())
            .ok_or(SessionError::NoAdapter(kind.as_str()))?;

        info!("Created {} player for party {}", kind.as_str(), self.party.id);

        self.players.insert(kind, player.clone());
        Ok(player)
    }

    async fn play(&mut self) -> SessionResult<()> {
        if let Some(player) = self.active_player() {
            if player.has_items() {
                player.play(None).await?;
                self.became_playing().await;

                return Ok(());
            }
        }

        let run = self.queue.next_playable_run();

        let Some(first) = run.first() else {
            self.active = None;
            self.became_idle();

            return Err(SessionError::EmptyQueue);
        };

        let kind = first.kind().player_kind();
        let player = self.player_for(kind)?;

        self.active = Some(kind);
        player.play(Some(run)).await?;
        self.became_playing().await;

        Ok(())
    }

    async fn pause(&mut self) -> SessionResult<()> {
        let Some(player) = self.active_player() else {
            return Err(SessionError::EmptyQueue);
        };

        if player.state() == PlayerState::Interrupted {
            return Err(SessionError::Interrupted);
        }

        if !player.has_items() {
            return Err(SessionError::EmptyQueue);
        }

        player.pause().await?;
        self.became_paused().await;

        Ok(())
    }

    async fn next(&mut self) -> SessionResult<()> {
        let Some(player) = self.active_player().filter(|p| p.has_items()) else {
            return Err(SessionError::EmptyQueue);
        };

        if player.state() == PlayerState::Interrupted {
            return Err(SessionError::Interrupted);
        }

        player.next().await?;
        self.track_finished().await;

        Ok(())
    }

    async fn attendees_changed(&mut self) -> SessionResult<()> {
        self.party = self.context.database.party_by_id(&self.party.id).await?;

        let message = SessionMessage::AttendeesChange {
            attendees: self.party.attendees.clone(),
        };

        self.broadcast(&message);
        Ok(())
    }

    async fn transfer_host(&mut self, to: UserId) -> SessionResult<()> {
        if let Some(player) = self.active_player() {
            if player.state() == PlayerState::Playing {
                match player.pause().await {
                    Ok(()) => self.became_paused().await,
                    Err(error) => warn!("Failed pausing previous host's player: {}", error),
                }
            }
        }

        // Players act with the previous host's credentials
        for (_, player) in self.players.drain() {
            player.stop();
        }

        self.active = None;
        self.state = PlayerState::Ready;
        self.timer.arm();

        self.party = self.context.database.party_by_id(&self.party.id).await?;
        info!("Party {} is now hosted by {}", self.party.id, to);

        if let Some(client) = self.clients.get(&to) {
            let promotion = SessionMessage::HostPromotion {
                host: self.party.host.clone(),
            };

            if let Err(error) = client.send(&promotion) {
                debug!("Could not notify new host {}: {}", to, error);
            }
        }

        let message = SessionMessage::AttendeesChange {
            attendees: self.party.attendees.clone(),
        };

        self.broadcast(&message);
        Ok(())
    }

    async fn handle_report(&mut self, report: PollReport) {
        let Some(player) = self
            .players
            .values()
            .find(|p| p.id() == report.player_id)
            .cloned()
        else {
            debug!("Ignoring report of a discarded player in {}", self.party.id);
            return;
        };

        let Some(event) = player.reconcile(report.snapshot) else {
            return;
        };

        if self.active != Some(player.kind()) {
            debug!("Ignoring {:?} of an inactive player in {}", event, self.party.id);
            return;
        }

        match event {
            PlayerEvent::Play => self.became_playing().await,
            PlayerEvent::Pause => self.became_paused().await,
            PlayerEvent::Interrupted => self.became_interrupted(),
            PlayerEvent::TrackFinished => self.track_finished().await,
        }
    }

    async fn track_finished(&mut self) {
        // The player already consumed the item
        if let Err(error) = self.queue.pop_front().await {
            error!("Failed popping queue of party {}: {}", self.party.id, error);
        }

        let player = self.active_player().filter(|p| p.has_items());

        let Some(player) = player else {
            match self.play().await {
                Ok(()) => {}
                Err(SessionError::EmptyQueue) => {
                    info!("Queue of party {} ran out", self.party.id)
                }
                Err(error) => {
                    warn!("Could not continue playback in {}: {}", self.party.id, error);
                    self.became_idle();
                }
            }

            self.broadcast_queue();
            return;
        };

        match (player.state(), self.state) {
            (PlayerState::Playing, PlayerState::Playing) => {
                if let Some(head) = self.queue.head_mut() {
                    head.state.play();
                }

                self.persist_head().await;
            }
            // Skipped while paused, which starts the remote again
            (PlayerState::Playing, _) => self.became_playing().await,
            _ => self.persist_head().await,
        }

        self.broadcast_queue();
    }

    async fn persist_head(&self) {
        if let Err(error) = self.queue.update_head().await {
            error!("Failed persisting queue head of {}: {}", self.party.id, error);
        }
    }

    async fn became_playing(&mut self) {
        if let Some(head) = self.queue.head_mut() {
            head.state.play();
        }

        self.persist_head().await;
        self.state = PlayerState::Playing;
        self.timer.disarm();
        self.broadcast(&SessionMessage::PlayerPlay);
    }

    async fn became_paused(&mut self) {
        if let Some(head) = self.queue.head_mut() {
            head.state.pause();
        }

        self.persist_head().await;
        self.state = PlayerState::Paused;
        self.timer.arm();
        self.broadcast(&SessionMessage::PlayerPause);
    }

    fn became_interrupted(&mut self) {
        self.state = PlayerState::Interrupted;
        self.timer.arm();
        self.broadcast(&SessionMessage::PlayerInterrupted);
    }

    fn became_idle(&mut self) {
        self.state = PlayerState::Ready;
        self.timer.arm();
    }

    async fn teardown(mut self, mut waiters: Vec<oneshot::Sender<()>>) {
        info!("Closing party {}", self.party.id);

        // No more reports or timeouts are accepted, which also ends every polling task
        self.reports.close();
        self.timer.disarm();

        // Pending requests are answered as closed, pending closes wait for the teardown
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Close { reply } = command {
                waiters.extend(reply);
            }
        }

        if let Some(player) = self.active_player() {
            if player.state() == PlayerState::Playing {
                if let Err(error) = player.pause().await {
                    warn!("Failed pausing player of {}: {}", self.party.id, error);
                }
            }
        }

        for player in self.players.values() {
            player.stop();
        }

        if let Err(error) = self.queue.delete().await {
            error!("Failed deleting queue of {}: {}", self.party.id, error);
        }

        match self.context.database.delete_party(&self.party.id).await {
            Ok(()) | Err(DatabaseError::NotFound { .. }) => {}
            Err(error) => error!("Failed deleting party {}: {}", self.party.id, error),
        }

        for client in self.clients.values() {
            let _ = client.send(&SessionMessage::PartyClose);
            client.close();
        }

        let id = self.id;
        self.context
            .sessions
            .remove_if(&self.party.id, |_, session| session.id == id);

        info!("Party {} closed", self.party.id);

        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}
