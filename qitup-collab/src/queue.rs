use log::warn;
use qitup_core::{Config, Item};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArcedStore, PrimaryKey, StoreError};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Stored item could not be read: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The items of a party in play order, mirrored to a durable list.
///
/// The durable list is written at its head and consumed from its tail,
/// so its tail is always the front of the queue.
pub struct Queue {
    party_id: PrimaryKey,
    key: String,
    store: ArcedStore,
    items: Vec<Item>,
}

/// A serializable copy of a queue's items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<Item>,
}

impl Queue {
    pub fn new(config: &Config, store: ArcedStore, party_id: &str) -> Self {
        Self {
            party_id: party_id.to_string(),
            key: config.queue_key(party_id),
            store,
            items: vec![],
        }
    }

    /// Rebuilds a queue from the durable list, oldest first.
    pub async fn resume(config: &Config, store: ArcedStore, party_id: &str) -> QueueResult<Self> {
        let mut queue = Self::new(config, store, party_id);
        let stored = queue.store.range(&queue.key).await?;

        queue.items = stored
            .iter()
            .rev()
            .map(|raw| serde_json::from_str(raw))
            .collect::<Result<_, _>>()?;

        Ok(queue)
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head_mut(&mut self) -> Option<&mut Item> {
        self.items.first_mut()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.clone(),
        }
    }

    /// Appends an item. If it can't be persisted, the queue is left as it was.
    pub async fn push(&mut self, item: Item) -> QueueResult<()> {
        let serialized = serde_json::to_string(&item)?;
        self.items.push(item);

        if let Err(error) = self.store.push_head(&self.key, serialized).await {
            self.items.pop();
            return Err(error.into());
        }

        Ok(())
    }

    /// Removes and returns the front item.
    pub async fn pop_front(&mut self) -> QueueResult<Option<Item>> {
        if self.items.is_empty() {
            return Ok(None);
        }

        if self.store.pop_tail(&self.key).await?.is_none() {
            warn!("Durable queue of party {} was already empty", self.party_id);
        }

        Ok(Some(self.items.remove(0)))
    }

    /// The longest run of items of the same kind at the front of the queue.
    pub fn next_playable_run(&self) -> Vec<Item> {
        let Some(first) = self.items.first() else {
            return vec![];
        };

        let kind = first.kind();

        self.items
            .iter()
            .take_while(|i| i.kind() == kind)
            .cloned()
            .collect()
    }

    /// Persists in-place changes to the front item.
    pub async fn update_head(&self) -> QueueResult<()> {
        let Some(head) = self.items.first() else {
            return Ok(());
        };

        let serialized = serde_json::to_string(head)?;
        self.store.set_index(&self.key, -1, serialized).await?;

        Ok(())
    }

    /// Removes the durable list.
    pub async fn delete(&self) -> QueueResult<()> {
        self.store.delete(&self.key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use qitup_core::{ItemKind, ItemSource};

    use crate::{testing::FlakyStore, MemoryStore, Store};

    use super::*;

    fn track(uri: &str) -> Item {
        Item::new(ItemSource::SpotifyTrack { uri: uri.into() })
    }

    fn episode(uri: &str) -> Item {
        Item::new(ItemSource::SpotifyEpisode { uri: uri.into() })
    }

    fn kinds(items: &[Item]) -> Vec<ItemKind> {
        items.iter().map(|i| i.kind()).collect()
    }

    fn keys(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.source_key()).collect()
    }

    #[tokio::test]
    async fn test_resume_reproduces_order_and_kinds() {
        let config = Config::default();
        let store: ArcedStore = Arc::new(MemoryStore::new());
        let mut queue = Queue::new(&config, store.clone(), "p1");

        let items = vec![track("a"), episode("b"), track("c"), track("d")];
        for item in items.clone() {
            queue.push(item).await.unwrap();
        }

        let resumed = Queue::resume(&config, store.clone(), "p1").await.unwrap();

        assert_eq!(keys(resumed.items()), keys(queue.items()));
        assert_eq!(kinds(resumed.items()), kinds(&items));

        // Consuming from either side keeps them in step
        queue.pop_front().await.unwrap();
        let resumed = Queue::resume(&config, store, "p1").await.unwrap();
        assert_eq!(keys(resumed.items()), vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_next_playable_run() {
        let config = Config::default();
        let store: ArcedStore = Arc::new(MemoryStore::new());
        let mut queue = Queue::new(&config, store, "p1");

        assert!(queue.next_playable_run().is_empty());

        for item in [track("a"), track("b"), episode("c"), track("d")] {
            queue.push(item).await.unwrap();
        }

        assert_eq!(keys(&queue.next_playable_run()), vec!["a", "b"]);

        queue.pop_front().await.unwrap();
        queue.pop_front().await.unwrap();
        assert_eq!(keys(&queue.next_playable_run()), vec!["c"]);
    }

    #[tokio::test]
    async fn test_failed_push_is_rolled_back() {
        let config = Config::default();
        let store = Arc::new(FlakyStore::default());
        let mut queue = Queue::new(&config, store.clone(), "p1");

        queue.push(track("a")).await.unwrap();
        store.fail(true);

        assert!(queue.push(track("b")).await.is_err());
        assert_eq!(keys(queue.items()), vec!["a"]);

        store.fail(false);
        let stored = store.range(&config.queue_key("p1")).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_update_head() {
        let config = Config::default();
        let store: ArcedStore = Arc::new(MemoryStore::new());
        let mut queue = Queue::new(&config, store.clone(), "p1");

        queue.push(track("a")).await.unwrap();
        queue.push(track("b")).await.unwrap();

        queue.head_mut().unwrap().state.play();
        queue.update_head().await.unwrap();

        let resumed = Queue::resume(&config, store.clone(), "p1").await.unwrap();
        assert!(resumed.items()[0].state.playing);
        assert!(!resumed.items()[1].state.playing);

        queue.delete().await.unwrap();
        let resumed = Queue::resume(&config, store, "p1").await.unwrap();
        assert!(resumed.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entry() {
        let config = Config::default();
        let store: ArcedStore = Arc::new(MemoryStore::new());

        store
            .push_head(&config.queue_key("p1"), "{\"type\":\"cassette\"}".into())
            .await
            .unwrap();

        assert!(matches!(
            Queue::resume(&config, store, "p1").await,
            Err(QueueError::Corrupt(_))
        ));
    }
}
