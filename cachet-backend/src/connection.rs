//! Connection lifecycle.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cachet_core::{KeyError, key::validate_segment_name};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::BackendError;
use crate::settings::Settings;
use crate::store::{ConnectionAttempt, ConnectionEvent, Connector, Store, StoreError};

struct Live<S> {
    store: Arc<S>,
    watcher: Option<JoinHandle<()>>,
}

/// Owns the single store connection of a cache.
///
/// The connection moves through `Uninitialized -> Connecting -> Ready` (or back
/// to no connection when the attempt fails) and `Ready -> Stopped`. Only the
/// manager mutates this state; callers observe it through
/// [`is_ready`](Self::is_ready).
///
/// Concurrent [`start`](Self::start) calls are serialized: a caller arriving
/// while an attempt is in flight waits for it and then reuses its connection.
pub struct ConnectionManager<C: Connector> {
    settings: Settings,
    connector: C,
    live: RwLock<Option<Live<C::Store>>>,
    starting: Mutex<()>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager with no connection yet.
    pub fn new(settings: Settings, connector: C) -> Self {
        Self {
            settings,
            connector,
            live: RwLock::new(None),
            starting: Mutex::new(()),
        }
    }

    /// Creates a manager around an already connected store.
    ///
    /// The manager is ready immediately and [`start`](Self::start) never
    /// opens another connection. The supplied store is not watched for
    /// errors: it stays the live handle until [`stop`](Self::stop).
    pub fn with_store(settings: Settings, connector: C, store: C::Store) -> Self {
        let manager = Self::new(settings, connector);
        *manager.write_live() = Some(Live {
            store: Arc::new(store),
            watcher: None,
        });
        manager
    }

    /// Returns the settings this manager was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns `true` iff a live connection is set.
    pub fn is_ready(&self) -> bool {
        self.read_live().is_some()
    }

    /// Returns the live store handle, if any.
    pub fn store(&self) -> Option<Arc<C::Store>> {
        self.read_live().as_ref().map(|live| live.store.clone())
    }

    /// Checks that `name` can be used as a segment name.
    pub fn validate_segment_name(&self, name: &str) -> Result<(), KeyError> {
        validate_segment_name(name)
    }

    /// Establishes the connection.
    ///
    /// Completes immediately (after yielding once) when already connected.
    /// Otherwise makes exactly one connection attempt and resolves on its
    /// first event: `Ready` makes the connection live, an `Error` aborts the
    /// attempt and is returned as [`BackendError::ConnectFailure`]. Events
    /// after readiness never reach the caller; errors among them are logged.
    pub async fn start(&self) -> Result<(), BackendError> {
        let _starting = self.starting.lock().await;

        if self.is_ready() {
            trace!("Store connection already established");
            tokio::task::yield_now().await;
            return Ok(());
        }

        let mode = self.settings.connection_mode();
        debug!(mode = mode.kind(), "Opening store connection");
        let mut attempt = self.connector.connect(mode, &self.settings);

        let event = attempt.next_event().await;
        match event {
            Some(ConnectionEvent::Ready(store)) => {
                let watcher = tokio::spawn(watch(attempt));
                *self.write_live() = Some(Live {
                    store: Arc::new(store),
                    watcher: Some(watcher),
                });
                debug!("Store connection ready");
                Ok(())
            }
            Some(ConnectionEvent::Error(error)) => {
                attempt.abort();
                debug!(%error, "Store connection failed");
                Err(BackendError::ConnectFailure(error))
            }
            None => {
                attempt.abort();
                Err(BackendError::ConnectFailure(StoreError::new(
                    "connection attempt ended without a result",
                )))
            }
        }
    }

    /// Closes the connection, if any.
    ///
    /// Detaches from connection events, asks the store to quit gracefully and
    /// clears the live handle. Calling it again is a no-op.
    pub async fn stop(&self) {
        let live = self.write_live().take();
        let Some(live) = live else {
            return;
        };

        if let Some(watcher) = live.watcher {
            watcher.abort();
        }
        if let Err(error) = live.store.quit().await {
            debug!(%error, "Store quit failed");
        }
        debug!("Store connection closed");
    }

    fn read_live(&self) -> RwLockReadGuard<'_, Option<Live<C::Store>>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_live(&self) -> RwLockWriteGuard<'_, Option<Live<C::Store>>> {
        self.live.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn watch<S>(mut attempt: ConnectionAttempt<S>) {
    while let Some(event) = attempt.next_event().await {
        match event {
            ConnectionEvent::Error(error) => {
                warn!(%error, "Store connection error");
            }
            ConnectionEvent::Ready(_) => {
                trace!("Ignoring repeated ready signal");
            }
        }
    }
}
