mod file;
mod memory;
mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redis::{RedisStore, RedisStoreActor};

use crate::config::{Config, StateBackend};
use crate::error::CalendarResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// State keys. `global:` survives workspace changes, `workspace:` does not.
pub mod keys {
    pub const GOOGLE_TOKEN: &str = "global:calendar.google.token";
    pub const ACKNOWLEDGED: &str = "global:calendar.acknowledged";
    pub const FILTER: &str = "workspace:calendar.filter";
    pub const EXPANDED: &str = "workspace:calendar.expanded";
    pub const EXPANDED_NODES: &str = "workspace:calendar.expandedNodes";
    pub const BUILD_COUNTER: &str = "workspace:buildCounter";
}

/// Key-value store for workspace and global state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> CalendarResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> CalendarResult<()>;

    async fn remove(&self, key: &str) -> CalendarResult<()>;
}

/// Read a typed value, `None` when the key is missing
pub async fn load<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> CalendarResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Write a typed value
pub async fn save<T: Serialize>(store: &dyn StateStore, key: &str, value: &T) -> CalendarResult<()> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Open the store selected in the configuration
pub fn open_store(config: &Config) -> CalendarResult<Arc<dyn StateStore>> {
    let store: Arc<dyn StateStore> = match config.state_backend {
        StateBackend::File => Arc::new(FileStore::new(config.state_file.clone())),
        StateBackend::Memory => Arc::new(MemoryStore::new()),
        StateBackend::Redis => Arc::new(RedisStore::spawn(&config.redis_url)?),
    };
    info!("Using {:?} state store", config.state_backend);
    Ok(store)
}
