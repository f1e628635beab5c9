#![allow(dead_code)]

mod test_store;

pub use test_store::{MemoryStore, Script, ScriptedConnector};

use cachet_backend::{Cache, Settings};

/// Cache over a fresh in-memory store that connects successfully.
pub fn ready_cache() -> (Cache<ScriptedConnector>, ScriptedConnector) {
    let connector = ScriptedConnector::new(Script::Ready);
    (Cache::new(Settings::default(), connector.clone()), connector)
}
