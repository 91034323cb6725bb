//! Sessions stored in signed cookies or in a server-side storage.
//!
//! The [`SessionStore`] of a request is created on first use by
//! [`Context::session_store`](crate::Context::session_store) and written to
//! the response by [`SessionMiddleware`].

mod backends;
mod middleware;
mod securecookie;
mod session_dict;
mod store;

pub use backends::{
    CookieBackend, CookieJar, MemoryStorage, SID_KEY, SecureCookieBackend, SessionBackend,
    SessionBackends, SessionStorage, StorageBackend,
};
pub use middleware::SessionMiddleware;
pub use securecookie::{Clock, SecureCookieSerializer, decode_json, encode_json};
pub use session_dict::{FLASH_KEY, Flash, SessionDict};
pub use store::{SessionOptions, SessionStore};

use serde_json::{Value, json};
use tipfy_config::{DefaultConfig, ModuleConfig};

/// Config module of the sessions extension.
pub const MODULE: &str = "tipfy.sessions";

/// Defaults of the `tipfy.sessions` config module.
///
/// `secret_key` is required. `cookie_args` holds the attributes of session
/// cookies: `max_age`, `domain`, `path`, `secure` and `httponly`.
pub struct SessionsDefaults;

impl DefaultConfig for SessionsDefaults {
    const MODULE: &'static str = MODULE;

    fn default_config() -> ModuleConfig {
        ModuleConfig::new()
            .required("secret_key")
            .with("default_backend", "securecookie")
            .with("cookie_name", "session")
            .with("session_max_age", Value::Null)
            .with(
                "cookie_args",
                json!({
                    "max_age": null,
                    "domain": null,
                    "path": "/",
                    "secure": null,
                    "httponly": false,
                }),
            )
    }
}
