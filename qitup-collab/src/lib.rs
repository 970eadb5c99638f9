mod credentials;
mod db;
mod events;
mod parties;
mod players;
mod queue;
mod store;
mod tokens;
mod util;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use dashmap::DashMap;

pub use credentials::*;
pub use db::*;
pub use events::*;
pub use parties::*;
pub use players::*;
pub use queue::*;
pub use store::*;
pub use tokens::*;
pub use util::random_string;

use qitup_core::Config;

/// Live sessions, by party id.
pub type SessionMap = Arc<DashMap<PrimaryKey, Session>>;

/// The qitup collab system, facilitating parties, their queues, and their live sessions.
pub struct Collab {
    context: CollabContext,

    pub parties: PartyManager,
}

/// A type passed to various components of the collab system, to access state and shared services.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Config,
    pub database: ArcedDatabase,
    pub store: ArcedStore,
    pub players: Arc<Players>,
    pub tokens: Arc<ConnectTokens>,

    pub sessions: SessionMap,
}

impl Collab {
    pub fn new(config: Config, database: ArcedDatabase, store: ArcedStore, players: Players) -> Self {
        let context = CollabContext {
            tokens: Arc::new(ConnectTokens::new(&config, store.clone())),
            players: Arc::new(players),
            config,
            database,
            store,

            sessions: Default::default(),
        };

        let parties = PartyManager::new(context.clone());

        Self { context, parties }
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn database(&self) -> &ArcedDatabase {
        &self.context.database
    }
}
