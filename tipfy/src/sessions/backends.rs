use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value, json};
use tipfy_config::ConfigError;

use super::securecookie::{SecureCookieSerializer, decode_json, encode_json};
use super::session_dict::SessionDict;
use super::MODULE;
use crate::errors::{Error, Result};
use crate::http_helpers::{CookieArgs, Response};

/// Key of the session id inside the cookie of storage-backed sessions.
pub const SID_KEY: &str = "_sid";

/// The request cookies and the signing key, as seen by session backends.
#[derive(Debug, Clone)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
    serializer: Option<SecureCookieSerializer>,
}

impl CookieJar {
    pub fn new(cookies: HashMap<String, String>, serializer: Option<SecureCookieSerializer>) -> Self {
        Self {
            cookies,
            serializer,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Fails when no `secret_key` is configured.
    pub fn serializer(&self) -> Result<&SecureCookieSerializer> {
        self.serializer
            .as_ref()
            .ok_or_else(|| ConfigError::required(MODULE, "secret_key").into())
    }

    pub fn get_secure(&self, name: &str, max_age: Option<i64>) -> Result<Option<Value>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        Ok(self.serializer()?.deserialize(name, value, max_age))
    }

    pub fn signed_value(&self, name: &str, value: &Value) -> Result<String> {
        Ok(self.serializer()?.serialize(name, value))
    }
}

/// Loads and saves one kind of session.
pub trait SessionBackend: Send + Sync {
    fn load(&self, jar: &CookieJar, name: &str, max_age: Option<i64>) -> Result<SessionDict>;

    /// Writes a modified session to `response`.
    fn save(
        &self,
        jar: &CookieJar,
        response: &mut Response,
        name: &str,
        session: &SessionDict,
        args: &CookieArgs,
    ) -> Result<()>;
}

fn into_session(value: Option<Value>) -> SessionDict {
    match value {
        Some(Value::Object(data)) => SessionDict::from_data(data),
        _ => SessionDict::new(),
    }
}

/// Session data stored in a signed cookie.
#[derive(Debug, Default)]
pub struct SecureCookieBackend;

impl SessionBackend for SecureCookieBackend {
    fn load(&self, jar: &CookieJar, name: &str, max_age: Option<i64>) -> Result<SessionDict> {
        Ok(into_session(jar.get_secure(name, max_age)?))
    }

    fn save(
        &self,
        jar: &CookieJar,
        response: &mut Response,
        name: &str,
        session: &SessionDict,
        args: &CookieArgs,
    ) -> Result<()> {
        let value = jar.signed_value(name, &session.to_value())?;
        response.set_cookie(name, &value, args);
        Ok(())
    }
}

/// Session data stored unsigned in a cookie, for data the client may read and change.
#[derive(Debug, Default)]
pub struct CookieBackend;

impl SessionBackend for CookieBackend {
    fn load(&self, jar: &CookieJar, name: &str, _max_age: Option<i64>) -> Result<SessionDict> {
        Ok(into_session(jar.get(name).and_then(decode_json)))
    }

    fn save(
        &self,
        _jar: &CookieJar,
        response: &mut Response,
        name: &str,
        session: &SessionDict,
        args: &CookieArgs,
    ) -> Result<()> {
        response.set_cookie(name, &encode_json(&session.to_value()), args);
        Ok(())
    }
}

/// Key-value storage for session data.
pub trait SessionStorage: Send + Sync {
    fn get(&self, sid: &str) -> Option<Map<String, Value>>;

    fn set(&self, sid: &str, data: Map<String, Value>);

    fn delete(&self, sid: &str);
}

/// Process-local session storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<FxHashMap<String, Map<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, sid: &str) -> Option<Map<String, Value>> {
        self.sessions.read().get(sid).cloned()
    }

    fn set(&self, sid: &str, data: Map<String, Value>) {
        self.sessions.write().insert(sid.to_string(), data);
    }

    fn delete(&self, sid: &str) {
        self.sessions.write().remove(sid);
    }
}

impl<S: SessionStorage + ?Sized> SessionStorage for Arc<S> {
    fn get(&self, sid: &str) -> Option<Map<String, Value>> {
        (**self).get(sid)
    }

    fn set(&self, sid: &str, data: Map<String, Value>) {
        (**self).set(sid, data)
    }

    fn delete(&self, sid: &str) {
        (**self).delete(sid)
    }
}

/// Session data kept in a [`SessionStorage`]. Only the session id travels
/// in a signed cookie.
#[derive(Debug, Default)]
pub struct StorageBackend<S> {
    storage: S,
}

impl<S: SessionStorage> StorageBackend<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn new_sid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn is_valid_sid(sid: &str) -> bool {
    sid.len() == 32
        && sid
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl<S: SessionStorage> SessionBackend for StorageBackend<S> {
    fn load(&self, jar: &CookieJar, name: &str, max_age: Option<i64>) -> Result<SessionDict> {
        let sid = jar
            .get_secure(name, max_age)?
            .and_then(|data| data.get(SID_KEY).and_then(Value::as_str).map(str::to_string))
            .filter(|sid| is_valid_sid(sid));

        let session = sid.and_then(|sid| {
            self.storage
                .get(&sid)
                .map(|data| SessionDict::from_data(data).with_sid(sid))
        });
        Ok(session.unwrap_or_else(|| SessionDict::new().with_sid(new_sid())))
    }

    fn save(
        &self,
        jar: &CookieJar,
        response: &mut Response,
        name: &str,
        session: &SessionDict,
        args: &CookieArgs,
    ) -> Result<()> {
        let sid = match session.sid() {
            Some(sid) if is_valid_sid(sid) => sid.to_string(),
            _ => new_sid(),
        };
        self.storage.set(&sid, session.data().clone());
        let value = jar.signed_value(name, &json!({ SID_KEY: sid }))?;
        response.set_cookie(name, &value, args);
        Ok(())
    }
}

/// Session backends by name.
#[derive(Clone)]
pub struct SessionBackends {
    backends: FxHashMap<String, Arc<dyn SessionBackend>>,
}

impl Default for SessionBackends {
    fn default() -> Self {
        let mut backends = Self {
            backends: FxHashMap::default(),
        };
        backends.register("securecookie", SecureCookieBackend);
        backends.register("cookie", CookieBackend);
        backends
    }
}

impl SessionBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, backend: impl SessionBackend + 'static) {
        self.register_arc(name, Arc::new(backend));
    }

    pub fn register_arc(&mut self, name: &str, backend: Arc<dyn SessionBackend>) {
        self.backends.insert(name.to_string(), backend);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SessionBackend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BackendNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }
}

impl fmt::Debug for SessionBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.backends.keys().collect();
        names.sort();
        f.debug_struct("SessionBackends").field("names", &names).finish()
    }
}
