use std::sync::Arc;

use qitup_core::{Id, UserId};
use thiserror::Error;

use crate::SessionMessage;

pub type ConnectionId = Id<ClientHandle>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection is closed")]
    Closed,
}

/// The sending half of a client's persistent connection.
pub trait ClientTransport: Send + Sync {
    fn send(&self, payload: String) -> Result<(), TransportError>;
    fn close(&self);
}

/// A client connected to a party.
#[derive(Clone)]
pub struct ClientHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    transport: Arc<dyn ClientTransport>,
}

impl ClientHandle {
    pub fn new(user_id: UserId, transport: Arc<dyn ClientTransport>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            transport,
        }
    }

    pub fn send(&self, message: &SessionMessage) -> Result<(), TransportError> {
        self.transport.send(message.to_json())
    }

    pub fn close(&self) {
        self.transport.close()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .finish()
    }
}
