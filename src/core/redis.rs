use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    /// Blocking left-pop with a server-side timeout; `None` means the wait
    /// elapsed without a delivery.
    pub(crate) async fn blpop(
        &self,
        key: &str,
        timeout_seconds: u64,
    ) -> Result<Option<String>, RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(None);
        };

        let popped: Option<(String, String)> = cmd("BLPOP")
            .arg(key)
            .arg(timeout_seconds)
            .query_async(&mut manager)
            .await?;

        Ok(popped.map(|(_, payload)| payload))
    }

    pub(crate) async fn rpush(&self, key: &str, payload: &str) -> Result<(), RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(());
        };

        cmd("RPUSH").arg(key).arg(payload).query_async::<_, ()>(&mut manager).await
    }
}
