mod connection;
mod session;
mod timer;

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

pub use connection::*;
pub use session::*;
pub use timer::*;

use crate::{
    CollabContext, DatabaseError, DatabaseResult, NewParty, PartyData, PartySettings, PrimaryKey,
    Queue, QueueError, QueueSnapshot, TokenError, UserData,
};

pub type PartyResult<T> = Result<T, PartyError>;

#[derive(Debug, Error)]
pub enum PartyError {
    #[error("Party does not exist")]
    NotFound,
    #[error("Only the host of the party can do this")]
    NotHost,
    #[error("User is not a member of the party")]
    NotMember,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a member needs to connect to a party.
#[derive(Debug, Clone)]
pub struct PartyConnect {
    pub party: PartyData,
    /// Single-use token for the live connection
    pub token: String,
    pub queue: QueueSnapshot,
}

/// A client attached to a live party.
#[derive(Clone)]
pub struct ConnectedClient {
    pub session: Session,
    pub connection_id: ConnectionId,
    pub user_id: PrimaryKey,
}

/// Creates, looks up, and closes the live sessions of parties.
pub struct PartyManager {
    context: CollabContext,
    /// Held while a session is rehydrated, so a party only ever gets one
    creating: tokio::sync::Mutex<()>,
}

impl PartyManager {
    pub fn new(context: CollabContext) -> Self {
        Self {
            context,
            creating: Default::default(),
        }
    }

    /// Creates a party hosted by the user and starts its session.
    pub async fn create_party(
        &self,
        host: &UserData,
        name: String,
        join_code: String,
        settings: PartySettings,
    ) -> PartyResult<PartyConnect> {
        let party = self
            .context
            .database
            .create_party(NewParty {
                name,
                join_code,
                settings,
                host_id: host.id.clone(),
            })
            .await?;

        let queue = Queue::new(&self.context.config, self.context.store.clone(), &party.id);
        self.create_session(party.clone(), queue);

        let token = self.context.tokens.issue(&host.id, &party).await?;

        info!(
            "{} created party {} ({})",
            host.display_name, party.id, party.join_code
        );

        Ok(PartyConnect {
            party,
            token,
            queue: QueueSnapshot::default(),
        })
    }

    pub async fn party_by_join_code(&self, join_code: &str) -> PartyResult<PartyData> {
        self.context
            .database
            .party_by_join_code(join_code)
            .await
            .optional()?
            .ok_or(PartyError::NotFound)
    }

    async fn party_by_id(&self, party_id: &str) -> PartyResult<PartyData> {
        self.context
            .database
            .party_by_id(party_id)
            .await
            .optional()?
            .ok_or(PartyError::NotFound)
    }

    /// Makes the user a member of the party with the join code and issues a connect token.
    pub async fn join(&self, user: &UserData, join_code: &str) -> PartyResult<PartyConnect> {
        let mut party = self.party_by_join_code(join_code).await?;

        if !party.is_member(&user.id) {
            party = self
                .context
                .database
                .add_attendee(&party.id, &user.id)
                .await?;

            info!("{} joined party {}", user.display_name, party.id);
            self.notify_attendees(&party.id).await;
        }

        let token = self.context.tokens.issue(&user.id, &party).await?;
        let queue = match self.session(&party.id) {
            Some(session) => session.queue().await?,
            None => Queue::resume(&self.context.config, self.context.store.clone(), &party.id)
                .await?
                .snapshot(),
        };

        Ok(PartyConnect {
            party,
            token,
            queue,
        })
    }

    /// Removes the user from the party.
    ///
    /// A leaving host hands the party to the oldest attendee, or closes it if there is none.
    pub async fn leave(&self, user_id: &str, party_id: &str) -> PartyResult<()> {
        let party = self.party_by_id(party_id).await?;

        if !party.is_member(user_id) {
            return Err(PartyError::NotMember);
        }

        if party.is_host(user_id) {
            let Some(successor) = party.attendees.first() else {
                info!("Host of party {} left, closing it", party.id);
                return self.close(&party.id).await;
            };

            self.hand_over(&party, &successor.user.id).await?;
        }

        self.context
            .database
            .remove_attendee(&party.id, user_id)
            .await?;

        info!("User {} left party {}", user_id, party.id);
        self.notify_attendees(&party.id).await;

        Ok(())
    }

    /// Makes an attendee the host. Only the current host can do this.
    pub async fn transfer_host(&self, party_id: &str, by: &str, to: &str) -> PartyResult<()> {
        let party = self.party_by_id(party_id).await?;

        if !party.is_host(by) {
            return Err(PartyError::NotHost);
        }

        if !party.is_member(to) {
            return Err(PartyError::NotMember);
        }

        self.hand_over(&party, to).await
    }

    async fn hand_over(&self, party: &PartyData, to: &str) -> PartyResult<()> {
        self.context.database.transfer_host(&party.id, to).await?;

        if let Some(session) = self.session(&party.id) {
            session.transfer_host(to.to_string()).await?;
        }

        Ok(())
    }

    async fn notify_attendees(&self, party_id: &str) {
        if let Some(session) = self.session(party_id) {
            if let Err(error) = session.attendees_changed().await {
                warn!("Could not notify attendees of {}: {}", party_id, error);
            }
        }
    }

    /// Redeems a connect token and attaches the client to the party's session.
    pub async fn connect(
        &self,
        token: &str,
        transport: Arc<dyn ClientTransport>,
    ) -> PartyResult<ConnectedClient> {
        let grant = self.context.tokens.redeem(token).await?;
        let session = self.resume_or_create(&grant.party_id).await?;

        let client = ClientHandle::new(grant.user_id.clone(), transport);
        let connection_id = client.id;

        session.client_connected(client).await?;

        Ok(ConnectedClient {
            session,
            connection_id,
            user_id: grant.user_id,
        })
    }

    /// Returns the live session of the party, rehydrating it from storage if needed.
    pub async fn resume_or_create(&self, party_id: &str) -> PartyResult<Session> {
        if let Some(session) = self.session(party_id) {
            return Ok(session);
        }

        let _guard = self.creating.lock().await;

        if let Some(session) = self.session(party_id) {
            return Ok(session);
        }

        let party = self.party_by_id(party_id).await?;
        let queue =
            Queue::resume(&self.context.config, self.context.store.clone(), party_id).await?;

        Ok(self.create_session(party, queue))
    }

    /// The live session of a party the user is a member of.
    pub async fn member_session(&self, party_id: &str, user_id: &str) -> PartyResult<Session> {
        let session = self.resume_or_create(party_id).await?;

        if !session.party().await?.is_member(user_id) {
            return Err(PartyError::NotMember);
        }

        Ok(session)
    }

    /// Starts a session and registers it, replacing any previous one.
    pub fn create_session(&self, party: PartyData, queue: Queue) -> Session {
        let party_id = party.id.clone();
        let session = Session::spawn(&self.context, party, queue);

        self.context.sessions.insert(party_id, session.clone());
        session
    }

    pub fn session(&self, party_id: &str) -> Option<Session> {
        self.context.sessions.get(party_id).map(|s| s.clone())
    }

    pub fn list_all(&self) -> Vec<Session> {
        self.context
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Closes the party, live or not.
    pub async fn close(&self, party_id: &str) -> PartyResult<()> {
        if let Some(session) = self.session(party_id) {
            session.close().await;
            return Ok(());
        }

        Queue::new(&self.context.config, self.context.store.clone(), party_id)
            .delete()
            .await?;

        self.context.database.delete_party(party_id).await.optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        testing::{track, Harness, RecordingTransport},
        Database,
    };

    use super::*;

    #[tokio::test]
    async fn test_join_and_connect() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let guest = harness.user("guest").await;
        let parties = &harness.collab.parties;

        let created = harness.party(&host, Default::default()).await;
        let joined = parties
            .join(&guest, &created.party.join_code)
            .await
            .unwrap();

        assert!(joined.party.is_member(&guest.id));
        assert_ne!(joined.token, created.token);

        // A second join while the token is live doesn't issue another
        assert!(matches!(
            parties.join(&guest, &created.party.join_code).await,
            Err(PartyError::Token(TokenError::AlreadyIssued))
        ));

        let transport = RecordingTransport::new();
        let client = parties
            .connect(&joined.token, transport.clone())
            .await
            .unwrap();

        assert_eq!(client.user_id, guest.id);
        assert_eq!(client.session.party_id(), created.party.id);
        assert_eq!(transport.types(), vec!["hello"]);

        // Tokens are single-use
        assert!(matches!(
            parties.connect(&joined.token, RecordingTransport::new()).await,
            Err(PartyError::Token(TokenError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_join_unknown_code() {
        let harness = Harness::new();
        let guest = harness.user("guest").await;

        assert!(matches!(
            harness.collab.parties.join(&guest, "nope").await,
            Err(PartyError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_resume_after_restart() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let party = harness.party(&host, Default::default()).await.party;
        let session = harness.collab.parties.session(&party.id).unwrap();

        session.push(track("a"), host.id.clone()).await.unwrap();
        session.push(track("b"), host.id.clone()).await.unwrap();

        let restarted = harness.restarted();
        assert!(restarted.parties.session(&party.id).is_none());

        let (first, second) = tokio::join!(
            restarted.parties.resume_or_create(&party.id),
            restarted.parties.resume_or_create(&party.id)
        );

        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.id(), second.id());
        assert_eq!(restarted.parties.list_all().len(), 1);

        let queue = first.queue().await.unwrap();
        let keys: Vec<_> = queue.items.iter().map(|i| i.source_key()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_member_session() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let stranger = harness.user("stranger").await;
        let party = harness.party(&host, Default::default()).await.party;
        let parties = &harness.collab.parties;

        assert!(parties.member_session(&party.id, &host.id).await.is_ok());
        assert!(matches!(
            parties.member_session(&party.id, &stranger.id).await,
            Err(PartyError::NotMember)
        ));
        assert!(matches!(
            parties.member_session("missing", &host.id).await,
            Err(PartyError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_transfer_requires_host() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let guest = harness.user("guest").await;
        let stranger = harness.user("stranger").await;
        let parties = &harness.collab.parties;

        let party = harness.party(&host, Default::default()).await.party;
        parties.join(&guest, &party.join_code).await.unwrap();

        assert!(matches!(
            parties.transfer_host(&party.id, &guest.id, &guest.id).await,
            Err(PartyError::NotHost)
        ));
        assert!(matches!(
            parties.transfer_host(&party.id, &host.id, &stranger.id).await,
            Err(PartyError::NotMember)
        ));
    }

    #[tokio::test]
    async fn test_host_leaving_hands_over() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let guest = harness.user("guest").await;
        let parties = &harness.collab.parties;

        let party = harness.party(&host, Default::default()).await.party;
        parties.join(&guest, &party.join_code).await.unwrap();

        parties.leave(&host.id, &party.id).await.unwrap();

        let party = harness.database.party_by_id(&party.id).await.unwrap();
        assert_eq!(party.host.id, guest.id);
        assert!(!party.is_member(&host.id));

        let session = parties.session(&party.id).unwrap();
        assert_eq!(session.party().await.unwrap().host.id, guest.id);

        assert!(matches!(
            parties.leave(&host.id, &party.id).await,
            Err(PartyError::NotMember)
        ));
    }

    #[tokio::test]
    async fn test_last_host_leaving_closes() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let parties = &harness.collab.parties;

        let party = harness.party(&host, Default::default()).await.party;
        parties.leave(&host.id, &party.id).await.unwrap();

        assert!(parties.session(&party.id).is_none());
        assert!(matches!(
            parties.party_by_join_code(&party.join_code).await,
            Err(PartyError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_join_code() {
        let harness = Harness::new();
        let host = harness.user("host").await;
        let parties = &harness.collab.parties;

        parties
            .create_party(&host, "One".into(), "same".into(), Default::default())
            .await
            .unwrap();

        assert!(matches!(
            parties
                .create_party(&host, "Two".into(), "same".into(), Default::default())
                .await,
            Err(PartyError::Database(DatabaseError::Conflict { .. }))
        ));
    }
}
