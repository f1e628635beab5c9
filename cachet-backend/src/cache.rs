//! Envelope cache operations.

use std::sync::Arc;

use bytes::Bytes;
use cachet_core::{Envelope, Key, KeyError, envelope};
use serde::{Serialize, de::DeserializeOwned};
use tracing::trace;

use crate::connection::ConnectionManager;
use crate::error::BackendError;
use crate::settings::Settings;
use crate::store::{Connector, DeleteStatus, Store};

/// Store expiration in whole seconds for a ttl in milliseconds.
///
/// Sub-second (including zero and negative) ttls round up to one second so
/// that an entry is never written without an expiration.
///
/// ```
/// use cachet_backend::expire_seconds;
///
/// assert_eq!(expire_seconds(500), 1);
/// assert_eq!(expire_seconds(2500), 2);
/// assert_eq!(expire_seconds(-1), 1);
/// ```
pub fn expire_seconds(ttl: i64) -> u64 {
    ttl.div_euclid(1000).max(1).unsigned_abs()
}

/// Cache over a single store connection.
///
/// Values are wrapped into an [`Envelope`] on write and validated on read.
/// Every data operation fails with [`BackendError::ConnectionNotStarted`]
/// before touching the store when the connection is not ready.
pub struct Cache<C: Connector> {
    connection: ConnectionManager<C>,
}

impl<C: Connector> Cache<C> {
    /// Creates a cache that connects with `connector` on [`start`](Self::start).
    pub fn new(settings: Settings, connector: C) -> Self {
        Self {
            connection: ConnectionManager::new(settings, connector),
        }
    }

    /// Creates a cache around an already connected store.
    pub fn with_store(settings: Settings, connector: C, store: C::Store) -> Self {
        Self {
            connection: ConnectionManager::with_store(settings, connector, store),
        }
    }

    /// Returns the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Returns the cache settings.
    pub fn settings(&self) -> &Settings {
        self.connection.settings()
    }

    /// See [`ConnectionManager::start`].
    pub async fn start(&self) -> Result<(), BackendError> {
        self.connection.start().await
    }

    /// See [`ConnectionManager::stop`].
    pub async fn stop(&self) {
        self.connection.stop().await
    }

    /// Returns `true` if the cache can serve operations.
    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    /// Checks that `name` can be used as a segment name.
    pub fn validate_segment_name(&self, name: &str) -> Result<(), KeyError> {
        self.connection.validate_segment_name(name)
    }

    /// Store key used for `key`.
    pub fn generate_key(&self, key: &Key) -> String {
        self.settings().generate_key(key)
    }

    /// Reads the envelope stored at `key`.
    ///
    /// Returns `Ok(None)` on a miss, which includes an empty stored value.
    /// Other stored data that isn't a valid envelope is an error, never a miss.
    pub async fn get<T>(&self, key: &Key) -> Result<Option<Envelope<T>>, BackendError>
    where
        T: DeserializeOwned,
    {
        let store = self.store()?;
        let cache_key = self.generate_key(key);

        trace!(key = %cache_key, "GET");
        let data = match store.get(&cache_key).await.map_err(BackendError::Store)? {
            Some(data) if !data.is_empty() => data,
            _ => return Ok(None),
        };

        Ok(Some(envelope::deserialize(&data)?))
    }

    /// Stores `value` at `key` for `ttl` milliseconds.
    ///
    /// The value is written first, then the expiration is set to
    /// [`expire_seconds(ttl)`](expire_seconds).
    pub async fn set<T>(&self, key: &Key, value: &T, ttl: i64) -> Result<(), BackendError>
    where
        T: Serialize + ?Sized,
    {
        let store = self.store()?;
        let data = envelope::serialize(&envelope::wrap(value, ttl))?;
        let cache_key = self.generate_key(key);

        trace!(key = %cache_key, ttl, "SET");
        store
            .set(&cache_key, Bytes::from(data))
            .await
            .map_err(BackendError::Store)?;
        store
            .expire(&cache_key, expire_seconds(ttl))
            .await
            .map_err(BackendError::Store)?;
        Ok(())
    }

    /// Deletes the entry at `key`. A missing entry is not an error.
    pub async fn drop(&self, key: &Key) -> Result<DeleteStatus, BackendError> {
        let store = self.store()?;
        let cache_key = self.generate_key(key);

        trace!(key = %cache_key, "DEL");
        store.delete(&cache_key).await.map_err(BackendError::Store)
    }

    fn store(&self) -> Result<Arc<C::Store>, BackendError> {
        self.connection
            .store()
            .ok_or(BackendError::ConnectionNotStarted)
    }
}
