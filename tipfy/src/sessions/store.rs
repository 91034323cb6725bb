use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{Map, Value};
use tipfy_config::{ConfigError, DefaultOr};

use super::backends::{CookieJar, SessionBackends};
use super::securecookie::{SecureCookieSerializer, encode_json};
use super::session_dict::SessionDict;
use super::MODULE;
use crate::errors::{Error, Result};
use crate::http_helpers::{CookieArgs, Response};
use crate::tipfy_application::Tipfy;

/// Options for [`SessionStore::get_session_with`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Cookie name. Defaults to the configured `cookie_name`.
    pub name: Option<String>,
    /// Backend name. Defaults to the configured `default_backend`.
    pub backend: Option<String>,
    /// Maximum age of the session cookie contents, in seconds.
    pub max_age: DefaultOr<Option<i64>>,
    /// Overrides of the configured `cookie_args`.
    pub cookie_args: Map<String, Value>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn backend(mut self, backend: &str) -> Self {
        self.backend = Some(backend.to_string());
        self
    }

    pub fn max_age(mut self, max_age: Option<i64>) -> Self {
        self.max_age = DefaultOr::Value(max_age);
        self
    }

    pub fn cookie_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.cookie_args.insert(key.to_string(), value.into());
        self
    }
}

type SessionKey = (String, String);

/// Sessions and cookies of one request, written to the response at the end.
///
/// Sessions are keyed by backend and cookie name. Only modified sessions
/// are saved.
#[derive(Debug)]
pub struct SessionStore {
    jar: CookieJar,
    backends: Arc<SessionBackends>,
    default_backend: String,
    cookie_name: String,
    session_max_age: Option<i64>,
    cookie_args: Map<String, Value>,
    sessions: BTreeMap<SessionKey, (SessionDict, CookieArgs)>,
    cookies: BTreeMap<String, (Option<String>, CookieArgs)>,
}

impl SessionStore {
    pub fn new(app: &Tipfy, cookies: &HashMap<String, String>) -> Result<Self> {
        let config = app.config();
        let serializer = match config.get_as::<String>(MODULE, "secret_key") {
            Ok(secret_key) => Some(SecureCookieSerializer::new(secret_key)),
            Err(ConfigError::RequiredKey { .. }) => None,
            Err(error) => return Err(error.into()),
        };
        let cookie_args = match config.get(MODULE, "cookie_args")? {
            Value::Object(args) => args,
            Value::Null => Map::new(),
            _ => {
                return Err(ConfigError::NotAMapping {
                    module: format!("{MODULE}.cookie_args"),
                }
                .into());
            }
        };

        Ok(Self {
            jar: CookieJar::new(cookies.clone(), serializer),
            backends: app.session_backends(),
            default_backend: config.get_as(MODULE, "default_backend")?,
            cookie_name: config.get_as(MODULE, "cookie_name")?,
            session_max_age: config.get_as(MODULE, "session_max_age")?,
            cookie_args,
            sessions: BTreeMap::new(),
            cookies: BTreeMap::new(),
        })
    }

    /// The default session.
    pub fn get_session(&mut self) -> Result<&mut SessionDict> {
        self.get_session_with(SessionOptions::default())
    }

    /// The session named by `options`, loaded by its backend on first use.
    pub fn get_session_with(&mut self, options: SessionOptions) -> Result<&mut SessionDict> {
        let key = self.session_key(options.name.as_deref(), options.backend.as_deref());
        let (session, _) = match self.sessions.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (backend, name) = entry.key();
                let max_age = options.max_age.resolve(|| self.session_max_age);
                let args = merge_cookie_args(self.cookie_args.clone(), &options.cookie_args)?;
                let session = self.backends.get(backend)?.load(&self.jar, name, max_age)?;
                entry.insert((session, args))
            }
        };
        Ok(session)
    }

    /// Replaces the session `name` with a new one holding `data`.
    pub fn set_session(
        &mut self,
        name: &str,
        data: Map<String, Value>,
        options: SessionOptions,
    ) -> Result<()> {
        let key = self.session_key(Some(name), options.backend.as_deref());
        let backend = self.backends.get(&key.0)?;
        let mut session = backend.load(&CookieJar::new(HashMap::new(), None), &key.1, None)?;
        session.update(data);
        let args = self.get_cookie_args(&options.cookie_args)?;
        self.sessions.insert(key, (session, args));
        Ok(())
    }

    /// Merges `overrides` into the cookie options of an already loaded session.
    pub fn update_session_args(
        &mut self,
        name: &str,
        backend: Option<&str>,
        overrides: &Map<String, Value>,
    ) -> Result<bool> {
        let key = self.session_key(Some(name), backend);
        let Some((_, args)) = self.sessions.get_mut(&key) else {
            return Ok(false);
        };
        let current = match serde_json::to_value(&*args) {
            Ok(Value::Object(current)) => current,
            _ => Map::new(),
        };
        *args = merge_cookie_args(current, overrides)?;
        Ok(true)
    }

    /// A secure cookie from the request, or `None` when absent or invalid.
    pub fn get_secure_cookie(
        &self,
        name: &str,
        max_age: DefaultOr<Option<i64>>,
    ) -> Result<Option<Value>> {
        let max_age = max_age.resolve(|| self.session_max_age);
        self.jar.get_secure(name, max_age)
    }

    /// Writes a secure cookie to `response` right away. `value` must be a mapping.
    pub fn set_secure_cookie(
        &self,
        response: &mut Response,
        name: &str,
        value: &Value,
        overrides: &Map<String, Value>,
    ) -> Result<()> {
        if !value.is_object() {
            return Err(Error::Other(anyhow!("secure cookie value must be a mapping")));
        }
        let args = self.get_cookie_args(overrides)?;
        let signed = self.jar.signed_value(name, value)?;
        response.set_cookie(name, &signed, &args);
        Ok(())
    }

    /// Registers a cookie to be written when sessions are saved.
    pub fn set_cookie(&mut self, name: &str, value: &str, overrides: &Map<String, Value>) -> Result<()> {
        let args = self.get_cookie_args(overrides)?;
        self.cookies
            .insert(name.to_string(), (Some(value.to_string()), args));
        Ok(())
    }

    /// Like [`SessionStore::set_cookie`], with the value encoded as base64 JSON.
    pub fn set_json_cookie(
        &mut self,
        name: &str,
        value: &Value,
        overrides: &Map<String, Value>,
    ) -> Result<()> {
        self.set_cookie(name, &encode_json(value), overrides)
    }

    /// Forgets a cookie registered with `set_cookie` or `delete_cookie`.
    pub fn unset_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    /// Registers a cookie to be deleted when sessions are saved.
    pub fn delete_cookie(&mut self, name: &str, overrides: &Map<String, Value>) -> Result<()> {
        let args = self.get_cookie_args(overrides)?;
        self.cookies.insert(name.to_string(), (None, args));
        Ok(())
    }

    /// The configured `cookie_args` updated with `overrides`.
    pub fn get_cookie_args(&self, overrides: &Map<String, Value>) -> Result<CookieArgs> {
        merge_cookie_args(self.cookie_args.clone(), overrides)
    }

    /// Writes registered cookies and modified sessions to `response`.
    ///
    /// Registered cookies are written once. Saved sessions stop being
    /// modified, so saving again writes nothing new.
    pub fn save_sessions(&mut self, response: &mut Response) -> Result<()> {
        for (name, (value, args)) in std::mem::take(&mut self.cookies) {
            match value {
                Some(value) => response.set_cookie(&name, &value, &args),
                None => response.delete_cookie(&name, &args.path, args.domain.as_deref()),
            }
        }

        for ((backend, name), (session, args)) in self.sessions.iter_mut() {
            if !session.is_modified() {
                continue;
            }
            self.backends
                .get(backend)?
                .save(&self.jar, response, name, session, args)?;
            session.reset_modified();
        }
        Ok(())
    }

    fn session_key(&self, name: Option<&str>, backend: Option<&str>) -> SessionKey {
        (
            backend.unwrap_or(&self.default_backend).to_string(),
            name.unwrap_or(&self.cookie_name).to_string(),
        )
    }
}

fn merge_cookie_args(mut args: Map<String, Value>, overrides: &Map<String, Value>) -> Result<CookieArgs> {
    args.extend(overrides.clone());
    serde_json::from_value(Value::Object(args)).map_err(|source| {
        ConfigError::InvalidValue {
            module: MODULE.to_string(),
            key: "cookie_args".to_string(),
            source,
        }
        .into()
    })
}
