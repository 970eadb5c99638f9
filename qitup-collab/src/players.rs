use std::{collections::HashMap, sync::Arc};

use qitup_core::{ArcedPlayer, PlayerFactory, PlayerKind, ReportSender, UserId};

/// The player factories available to sessions, by the kind of player they create.
#[derive(Default, Clone)]
pub struct Players {
    factories: HashMap<PlayerKind, Arc<dyn PlayerFactory>>,
}

impl Players {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, factory: F) -> Self
    where
        F: PlayerFactory + 'static,
    {
        self.factories.insert(factory.kind(), Arc::new(factory));
        self
    }

    /// Creates a player of the given kind for the host, if one is registered.
    pub fn create(
        &self,
        kind: PlayerKind,
        host: &UserId,
        reports: ReportSender,
    ) -> Option<ArcedPlayer> {
        self.factories
            .get(&kind)
            .map(|factory| factory.create(host, reports))
    }
}
