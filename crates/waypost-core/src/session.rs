//! Session collaborator.
//!
//! Dispatch code reads and writes per-visitor state through [`Session`], an
//! opaque key-value map backed by a pluggable [`SessionStore`]:
//!
//! - [`NativeStore`] keeps payloads in an in-process map keyed by session id.
//! - [`CookieStore`] keeps the encoded payload as the cookie value itself,
//!   keyed by the session (cookie) name.
//!
//! The router never depends on session internals.
//!
//! ```
//! use std::sync::Arc;
//! use waypost_core::session::{NativeStore, Session};
//!
//! let store = Arc::new(NativeStore::new());
//! let mut session = Session::start(store, None).unwrap();
//! session.set("user", serde_json::json!("alice"));
//! assert_eq!(session.get("user"), Some(&serde_json::json!("alice")));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{WaypostError, WaypostResult};
use crate::settings::SessionBackendKind;

/// Persistence for encoded session payloads.
pub trait SessionStore: Send + Sync {
    /// Reads the stored payload for `id`, if any.
    fn read(&self, id: &str) -> WaypostResult<Option<String>>;

    /// Stores `payload` under `id`, replacing any previous payload.
    fn write(&self, id: &str, payload: &str) -> WaypostResult<()>;

    /// Removes the payload for `id`. Removing a missing id is not an error.
    fn remove(&self, id: &str) -> WaypostResult<()>;
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct NativeStore {
    sessions: RwLock<HashMap<String, String>>,
}

impl NativeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no sessions are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for NativeStore {
    fn read(&self, id: &str) -> WaypostResult<Option<String>> {
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn write(&self, id: &str, payload: &str) -> WaypostResult<()> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, id: &str) -> WaypostResult<()> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }
}

/// Cookie-backed session store.
///
/// Holds the cookie jar exchanged with the client: the session name maps to
/// the encoded payload that is sent back as the cookie value.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: RwLock<HashMap<String, String>>,
}

impl CookieStore {
    /// Creates an empty cookie jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar seeded with cookies received from the client.
    pub fn from_cookies(cookies: HashMap<String, String>) -> Self {
        Self {
            cookies: RwLock::new(cookies),
        }
    }

    /// Returns the current value of cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl SessionStore for CookieStore {
    fn read(&self, id: &str) -> WaypostResult<Option<String>> {
        Ok(self.cookie(id))
    }

    fn write(&self, id: &str, payload: &str) -> WaypostResult<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, id: &str) -> WaypostResult<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }
}

/// Creates an empty store for the configured backend.
pub fn store_for(kind: SessionBackendKind) -> Arc<dyn SessionStore> {
    match kind {
        SessionBackendKind::Native => Arc::new(NativeStore::new()),
        SessionBackendKind::Cookie => Arc::new(CookieStore::new()),
    }
}

/// A key-value session bound to a store.
pub struct Session {
    id: String,
    data: BTreeMap<String, serde_json::Value>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Starts a session. With `id` the stored payload is loaded; without one a
    /// fresh id is generated.
    ///
    /// A stored payload that cannot be decoded yields an empty session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to read.
    pub fn start(store: Arc<dyn SessionStore>, id: Option<&str>) -> WaypostResult<Self> {
        let id = id.map_or_else(|| uuid::Uuid::new_v4().simple().to_string(), String::from);

        let data = match store.read(&id)? {
            Some(payload) => decode(&payload).unwrap_or_else(|e| {
                tracing::warn!(session = %id, "Discarding unreadable session payload: {e}");
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };

        Ok(Self { id, data, store })
    }

    /// Returns the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Sets a value.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Removes a value, returning it.
    pub fn delete(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Returns all session data.
    pub fn as_map(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.data
    }

    /// Encodes the session data as a string (base64 of the JSON payload).
    pub fn encode(&self) -> String {
        // Serializing a map of JSON values cannot fail.
        let json = serde_json::to_vec(&self.data).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Persists the session data to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to write.
    pub fn write(&self) -> WaypostResult<()> {
        self.store.write(&self.id, &self.encode())
    }

    /// Destroys the session in the store and clears its data.
    ///
    /// Returns `false` if the store could not remove the session.
    pub fn destroy(&mut self) -> bool {
        match self.store.remove(&self.id) {
            Ok(()) => {
                self.data.clear();
                true
            }
            Err(e) => {
                tracing::warn!(session = %self.id, "Failed to destroy session: {e}");
                false
            }
        }
    }
}

/// Decodes a payload produced by [`Session::encode`].
///
/// # Errors
///
/// Returns a serialization error if the payload is not base64-encoded JSON.
pub fn decode(payload: &str) -> WaypostResult<BTreeMap<String, serde_json::Value>> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| WaypostError::SerializationError(format!("Invalid session encoding: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| WaypostError::SerializationError(format!("Invalid session payload: {e}")))
}
