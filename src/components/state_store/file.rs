use super::StateStore;
use crate::error::{state_error, CalendarResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// JSON document on disk holding every key
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> CalendarResult<Map<String, Value>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => match serde_json::from_str(&content)? {
                Value::Object(map) => Ok(map),
                _ => Err(state_error(&format!(
                    "State file {} does not contain a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, map: Map<String, Value>) -> CalendarResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        // Replace the document atomically
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&Value::Object(map))?).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> CalendarResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> CalendarResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        self.write_all(map).await
    }

    async fn remove(&self, key: &str) -> CalendarResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(path.clone());
        assert_eq!(store.get("missing").await.unwrap(), None);
        store.set("workspace:calendar.filter", json!("lunch")).await.unwrap();
        store.set("workspace:buildCounter", json!(7)).await.unwrap();

        let reopened = FileStore::new(path);
        assert_eq!(
            reopened.get("workspace:buildCounter").await.unwrap(),
            Some(json!(7))
        );
        reopened.remove("workspace:calendar.filter").await.unwrap();
        assert_eq!(reopened.get("workspace:calendar.filter").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_object_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileStore::new(path);
        assert!(store.get("anything").await.is_err());
    }
}
