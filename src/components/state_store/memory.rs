use super::StateStore;
use crate::error::CalendarResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process store, lost on exit
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> CalendarResult<Option<Value>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> CalendarResult<()> {
        self.data.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CalendarResult<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::state_store::{keys, load, save};

    #[tokio::test]
    async fn test_typed_roundtrip_and_remove() {
        let store = MemoryStore::new();
        assert_eq!(load::<String>(&store, keys::FILTER).await.unwrap(), None);

        save(&store, keys::FILTER, &"lunch".to_string()).await.unwrap();
        assert_eq!(
            load::<String>(&store, keys::FILTER).await.unwrap().as_deref(),
            Some("lunch")
        );

        store.remove(keys::FILTER).await.unwrap();
        assert_eq!(load::<String>(&store, keys::FILTER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_serialization_error() {
        let store = MemoryStore::new();
        save(&store, keys::BUILD_COUNTER, &"not a number").await.unwrap();
        assert!(load::<u64>(&store, keys::BUILD_COUNTER).await.is_err());
    }
}
