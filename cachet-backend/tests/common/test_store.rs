//! In-memory store and scripted connector for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cachet_backend::{
    ConnectionAttempt, ConnectionEvents, ConnectionMode, Connector, DeleteStatus, Settings, Store,
    StoreError, StoreResult,
};
use dashmap::DashMap;

#[derive(Debug, Default)]
struct MemoryInner {
    entries: DashMap<String, Bytes>,
    expirations: DashMap<String, u64>,
    failures: DashMap<&'static str, String>,
    commands: AtomicUsize,
    quits: AtomicUsize,
}

/// Simple in-memory store using DashMap.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `command` ("get", "set", "expire", "delete",
    /// "quit") fail with `message`.
    pub fn fail(&self, command: &'static str, message: &str) {
        self.inner.failures.insert(command, message.to_owned());
    }

    pub fn insert_raw(&self, key: &str, data: impl Into<Bytes>) {
        self.inner.entries.insert(key.to_owned(), data.into());
    }

    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.inner.entries.get(key).map(|v| v.clone())
    }

    /// Expiration in seconds last set for `key`.
    pub fn expiration(&self, key: &str) -> Option<u64> {
        self.inner.expirations.get(key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Number of data commands received (quit excluded).
    pub fn command_count(&self) -> usize {
        self.inner.commands.load(Ordering::SeqCst)
    }

    pub fn quit_count(&self) -> usize {
        self.inner.quits.load(Ordering::SeqCst)
    }

    fn check(&self, command: &'static str) -> StoreResult<()> {
        if command != "quit" {
            self.inner.commands.fetch_add(1, Ordering::SeqCst);
        }
        match self.inner.failures.get(command) {
            Some(message) => Err(StoreError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.check("get")?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.check("set")?;
        self.inner.entries.insert(key.to_owned(), value);
        self.inner.expirations.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()> {
        self.check("expire")?;
        if self.inner.entries.contains_key(key) {
            self.inner.expirations.insert(key.to_owned(), seconds);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus> {
        self.check("delete")?;
        self.inner.expirations.remove(key);
        Ok(match self.inner.entries.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn quit(&self) -> StoreResult<()> {
        self.inner.quits.fetch_add(1, Ordering::SeqCst);
        self.check("quit")
    }
}

/// What a connection attempt reports.
#[derive(Debug, Clone)]
pub enum Script {
    /// Ready right away.
    Ready,
    /// Ready after a delay.
    ReadyAfter(Duration),
    /// Error right away.
    Fail(&'static str),
    /// Two errors, then ready.
    FailTwiceThenReady(&'static str),
    /// Ready twice, then an error.
    ReadyTwiceThenFail(&'static str),
    /// Ends without reporting anything.
    Close,
}

#[derive(Default)]
struct ConnectorState {
    attempts: AtomicUsize,
    modes: Mutex<Vec<ConnectionMode>>,
    events: Mutex<Option<ConnectionEvents<MemoryStore>>>,
}

/// Connector handing out a shared [`MemoryStore`] according to a [`Script`].
#[derive(Clone)]
pub struct ScriptedConnector {
    store: MemoryStore,
    script: Arc<Mutex<Script>>,
    state: Arc<ConnectorState>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            store: MemoryStore::new(),
            script: Arc::new(Mutex::new(script)),
            state: Arc::default(),
        }
    }

    /// The store every successful attempt connects to.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Changes the script for following attempts.
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<ConnectionMode> {
        self.state.modes.lock().unwrap().clone()
    }

    /// Emits an error on the latest attempt, as a client would after a
    /// network failure. Returns `false` if the attempt is no longer observed.
    pub fn emit_error(&self, message: &str) -> bool {
        self.state
            .events
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|events| events.error(message))
    }

    /// Returns `true` while the latest attempt is still observed.
    pub fn attempt_observed(&self) -> bool {
        self.state
            .events
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(ConnectionEvents::is_observed)
    }
}

impl Connector for ScriptedConnector {
    type Store = MemoryStore;

    fn connect(&self, mode: ConnectionMode, _settings: &Settings) -> ConnectionAttempt<MemoryStore> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        self.state.modes.lock().unwrap().push(mode);

        let (events, attempt) = ConnectionAttempt::channel();
        let script = self.script.lock().unwrap().clone();
        let store = self.store.clone();

        let attempt = match script {
            Script::Ready => {
                events.ready(store);
                attempt
            }
            Script::ReadyAfter(delay) => {
                let events = events.clone();
                attempt.with_task(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.ready(store);
                }))
            }
            Script::Fail(message) => {
                events.error(message);
                attempt
            }
            Script::FailTwiceThenReady(message) => {
                events.error(message);
                events.error(message);
                events.ready(store);
                attempt
            }
            Script::ReadyTwiceThenFail(message) => {
                events.ready(store.clone());
                events.ready(store);
                events.error(message);
                attempt
            }
            Script::Close => {
                // Nothing is kept, so the channel closes with no event.
                return attempt;
            }
        };

        *self.state.events.lock().unwrap() = Some(events);
        attempt
    }
}
