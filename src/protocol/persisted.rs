//! Persisted session state (spec §6): a single string-keyed string-valued
//! store the embedder supplies. The core only ever touches one key,
//! [`PREV_SID_KEY`] — read at start-up and written on every successful
//! `hello`, so a reconnect can present `prev_sid` and avoid a `CONN_CONFLICT`
//! bye from the cloud.

use std::collections::HashMap;

use parking_lot::Mutex;

pub const PREV_SID_KEY: &str = "prev_sid";

pub trait PersistedState: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// In-memory store used by the reference binary and tests. An embedder
/// that needs the session id to survive a process restart supplies its own
/// `PersistedState` (e.g. backed by a one-line file) instead.
#[derive(Default)]
pub struct InMemoryPersistedState {
    inner: Mutex<HashMap<String, String>>,
}

impl InMemoryPersistedState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistedState for InMemoryPersistedState {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.inner.lock().insert(key.to_string(), value);
    }
}
