use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;

use super::{Store, StoreError, StoreResult};

/// A [Store] kept in process memory. Expired values are dropped lazily when touched.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
}

#[derive(Debug)]
struct Record {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
enum Value {
    Text(String),
    List(VecDeque<String>),
}

impl Record {
    fn list() -> Self {
        Self {
            value: Value::List(Default::default()),
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
        }
    }

    fn drop_expired(&self, key: &str) {
        self.records.remove_if(key, |_, r| r.is_expired());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push_head(&self, key: &str, value: String) -> StoreResult<usize> {
        self.drop_expired(key);

        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(Record::list);

        match &mut record.value {
            Value::List(list) => {
                list.push_front(value);
                Ok(list.len())
            }
            Value::Text(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn pop_tail(&self, key: &str) -> StoreResult<Option<String>> {
        self.drop_expired(key);

        let popped = match self.records.get_mut(key) {
            None => return Ok(None),
            Some(mut record) => match &mut record.value {
                Value::List(list) => list.pop_back(),
                Value::Text(_) => return Err(Self::wrong_type(key)),
            },
        };

        // Empty lists don't exist
        self.records
            .remove_if(key, |_, r| matches!(&r.value, Value::List(l) if l.is_empty()));

        Ok(popped)
    }

    async fn range(&self, key: &str) -> StoreResult<Vec<String>> {
        self.drop_expired(key);

        match self.records.get(key) {
            None => Ok(vec![]),
            Some(record) => match &record.value {
                Value::List(list) => Ok(list.iter().cloned().collect()),
                Value::Text(_) => Err(Self::wrong_type(key)),
            },
        }
    }

    async fn set_index(&self, key: &str, index: i64, value: String) -> StoreResult<()> {
        self.drop_expired(key);

        let mut record = self.records.get_mut(key).ok_or_else(|| StoreError::Missing {
            key: key.to_string(),
        })?;

        let Value::List(list) = &mut record.value else {
            return Err(Self::wrong_type(key));
        };

        let len = list.len() as i64;
        let position = if index < 0 { len + index } else { index };

        if position < 0 || position >= len {
            return Err(StoreError::OutOfRange {
                key: key.to_string(),
                index,
            });
        }

        list[position as usize] = value;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .records
            .remove(key)
            .is_some_and(|(_, record)| !record.is_expired()))
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> StoreResult<bool> {
        let record = Record {
            value: Value::Text(value),
            expires_at: Some(Instant::now() + ttl),
        };

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                if !existing.get().is_expired() {
                    return Ok(false);
                }

                existing.insert(record);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let removed = self
            .records
            .remove_if(key, |_, r| matches!(r.value, Value::Text(_)));

        match removed {
            Some((_, record)) if record.is_expired() => Ok(None),
            Some((_, Record { value: Value::Text(value), .. })) => Ok(Some(value)),
            Some(_) => Err(Self::wrong_type(key)),
            None if self.records.contains_key(key) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_list_is_fifo_through_head_and_tail() {
        let store = MemoryStore::new();

        store.push_head("q", "a".into()).await.unwrap();
        store.push_head("q", "b".into()).await.unwrap();
        assert_eq!(store.push_head("q", "c".into()).await.unwrap(), 3);

        assert_eq!(store.range("q").await.unwrap(), vec!["c", "b", "a"]);
        assert_eq!(store.pop_tail("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop_tail("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.pop_tail("q").await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.pop_tail("q").await.unwrap(), None);
        assert!(store.range("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_index_from_tail() {
        let store = MemoryStore::new();

        store.push_head("q", "a".into()).await.unwrap();
        store.push_head("q", "b".into()).await.unwrap();
        store.set_index("q", -1, "A".into()).await.unwrap();

        assert_eq!(store.range("q").await.unwrap(), vec!["b", "A"]);
        assert!(matches!(
            store.set_index("q", 2, "x".into()).await,
            Err(StoreError::OutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            store.set_index("other", -1, "x".into()).await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);

        assert!(store.set_if_absent("t", "1".into(), ttl).await.unwrap());
        assert!(!store.set_if_absent("t", "2".into(), ttl).await.unwrap());

        assert_eq!(store.take("t").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.take("t").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_expire() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);

        store.set_if_absent("t", "1".into(), ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(store.take("t").await.unwrap(), None);

        store.set_if_absent("u", "1".into(), ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        // An expired key can be set again
        assert!(store.set_if_absent("u", "2".into(), ttl).await.unwrap());
        assert_eq!(store.take("u").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();

        store.push_head("q", "a".into()).await.unwrap();

        assert!(matches!(
            store.take("q").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(store.delete("q").await.unwrap());
        assert!(!store.delete("q").await.unwrap());
    }
}
