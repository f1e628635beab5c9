//! Redis implementation of the store capability.

use async_trait::async_trait;
use bytes::Bytes;
use cachet_backend::{DeleteStatus, Store, StoreResult};
use redis::aio::ConnectionManager;
use tracing::trace;

use crate::error::Error;

/// Connected Redis handle.
///
/// Wraps a redis-rs [`ConnectionManager`], which multiplexes commands over a
/// single connection and reconnects on its own. Cloning is cheap.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Wraps an already established connection.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let mut con = self.connection.clone();
        let data: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(data.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let mut con = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value.as_ref())
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut con = self.connection.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus> {
        let mut con = self.connection.clone();
        let deleted: u32 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn quit(&self) -> StoreResult<()> {
        trace!("QUIT");
        let mut con = self.connection.clone();
        redis::cmd("QUIT")
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
