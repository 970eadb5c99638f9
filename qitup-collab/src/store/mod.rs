use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

mod memory;
pub use memory::*;

pub type ArcedStore = Arc<dyn Store>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{key} holds a different kind of value")]
    WrongType { key: String },
    #[error("{key} doesn't exist")]
    Missing { key: String },
    #[error("Index {index} is out of range for {key}")]
    OutOfRange { key: String, index: i64 },
    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A keyed store of lists and expiring values, used for data that has to
/// survive a session but not the party.
///
/// Lists are written at the head and read from the tail, so a list used with
/// [Store::push_head] and [Store::pop_tail] behaves as a FIFO.
#[async_trait]
pub trait Store: Send + Sync {
    /// Prepends a value to a list, creating it if needed. Returns the new length.
    async fn push_head(&self, key: &str, value: String) -> StoreResult<usize>;
    /// Removes and returns the last value of a list.
    async fn pop_tail(&self, key: &str) -> StoreResult<Option<String>>;
    /// Returns a whole list, head first.
    async fn range(&self, key: &str) -> StoreResult<Vec<String>>;
    /// Overwrites a list element. Negative indices count from the tail, -1 being the last.
    async fn set_index(&self, key: &str, index: i64, value: String) -> StoreResult<()>;
    /// Removes a key of any kind. Returns whether something was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
    /// Stores a value that expires after `ttl`, unless the key is already live.
    /// Returns whether the value was stored.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> StoreResult<bool>;
    /// Atomically returns and removes a value.
    async fn take(&self, key: &str) -> StoreResult<Option<String>>;
}
