use super::StateStore;
use crate::error::{state_error, CalendarResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// Prefix of every key written by this application
const KEY_PREFIX: &str = "calendar_tree:";

/// The Redis actor that processes state requests
pub struct RedisStoreActor {
    client: RedisClient,
    connection: Option<MultiplexedConnection>,
    command_rx: mpsc::Receiver<RedisCommand>,
}

/// Commands that can be sent to the Redis actor
pub enum RedisCommand {
    Get(String, oneshot::Sender<CalendarResult<Option<Value>>>),
    Set(String, Value, oneshot::Sender<CalendarResult<()>>),
    Remove(String, oneshot::Sender<CalendarResult<()>>),
    Shutdown,
}

/// Handle for communicating with the Redis actor
#[derive(Clone)]
pub struct RedisStore {
    command_tx: mpsc::Sender<RedisCommand>,
}

impl RedisStore {
    /// Create the actor and spawn it on the current runtime
    pub fn spawn(redis_url: &str) -> CalendarResult<Self> {
        let (mut actor, handle) = RedisStoreActor::new(redis_url)?;
        tokio::spawn(async move {
            actor.run().await;
        });
        Ok(handle)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<CalendarResult<T>>) -> RedisCommand,
    ) -> CalendarResult<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|e| state_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .await
            .map_err(|_| state_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalendarResult<()> {
        let _ = self.command_tx.send(RedisCommand::Shutdown).await;
        Ok(())
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> CalendarResult<Option<Value>> {
        let key = key.to_string();
        self.request(|tx| RedisCommand::Get(key, tx)).await
    }

    async fn set(&self, key: &str, value: Value) -> CalendarResult<()> {
        let key = key.to_string();
        self.request(|tx| RedisCommand::Set(key, value, tx)).await
    }

    async fn remove(&self, key: &str) -> CalendarResult<()> {
        let key = key.to_string();
        self.request(|tx| RedisCommand::Remove(key, tx)).await
    }
}

impl RedisStoreActor {
    /// Create a new actor and return its handle
    pub fn new(redis_url: &str) -> CalendarResult<(Self, RedisStore)> {
        let (command_tx, command_rx) = mpsc::channel(32);

        let client = RedisClient::open(redis_url)
            .map_err(|e| state_error(&format!("Failed to create Redis client: {}", e)))?;

        let actor = Self {
            client,
            connection: None,
            command_rx,
        };

        Ok((actor, RedisStore { command_tx }))
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Redis state actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                RedisCommand::Get(key, response_tx) => {
                    let result = self.get_value(&key).await;
                    let _ = response_tx.send(result);
                }
                RedisCommand::Set(key, value, response_tx) => {
                    let result = self.set_value(&key, value).await;
                    let _ = response_tx.send(result);
                }
                RedisCommand::Remove(key, response_tx) => {
                    let result = self.remove_value(&key).await;
                    let _ = response_tx.send(result);
                }
                RedisCommand::Shutdown => {
                    info!("Redis state actor shutting down");
                    break;
                }
            }
        }

        info!("Redis state actor shut down");
    }

    /// Get a redis connection, connecting lazily
    async fn connection(&mut self) -> CalendarResult<MultiplexedConnection> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!("Failed to connect to Redis: {}", e);
                state_error(&format!("Failed to connect to Redis: {}", e))
            })?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    async fn get_value(&mut self, key: &str) -> CalendarResult<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(format!("{}{}", KEY_PREFIX, key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_value(&mut self, key: &str, value: Value) -> CalendarResult<()> {
        let mut conn = self.connection().await?;
        () = conn
            .set(format!("{}{}", KEY_PREFIX, key), value.to_string())
            .await?;
        Ok(())
    }

    async fn remove_value(&mut self, key: &str) -> CalendarResult<()> {
        let mut conn = self.connection().await?;
        () = conn.del(format!("{}{}", KEY_PREFIX, key)).await?;
        Ok(())
    }
}
