use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;

/// Source of the current unix timestamp, in seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Signs and timestamps values so they can be stored in cookies.
///
/// A cookie value has the form `base64(json)|timestamp|signature`, where the
/// signature is the hex HMAC-SHA1 of `name|base64(json)|timestamp`.
/// Anything that does not verify decodes to `None`.
#[derive(Clone)]
pub struct SecureCookieSerializer {
    secret_key: Vec<u8>,
    clock: Clock,
}

impl SecureCookieSerializer {
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn serialize(&self, name: &str, value: &Value) -> String {
        let timestamp = (self.clock)().to_string();
        let encoded = encode_json(value);
        let signature = self.get_signature(name, &encoded, &timestamp);
        [encoded, timestamp, signature].join("|")
    }

    /// The value stored in `value`, or `None` when it is malformed, forged,
    /// older than `max_age` seconds or undecodable.
    pub fn deserialize(&self, name: &str, value: &str, max_age: Option<i64>) -> Option<Value> {
        let parts: Vec<&str> = value.split('|').collect();
        let [encoded, timestamp, signature] = parts[..] else {
            return None;
        };

        let expected = self.get_signature(name, encoded, timestamp);
        if !bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
            warn!(cookie = name, "invalid cookie signature");
            return None;
        }

        let Ok(timestamp) = timestamp.parse::<i64>() else {
            warn!(cookie = name, "invalid cookie timestamp");
            return None;
        };
        if let Some(max_age) = max_age {
            if timestamp < (self.clock)() - max_age {
                warn!(cookie = name, "expired cookie");
                return None;
            }
        }

        let decoded = decode_json(encoded);
        if decoded.is_none() {
            warn!(cookie = name, "cookie value failed to be decoded");
        }
        decoded
    }

    fn get_signature(&self, name: &str, value: &str, timestamp: &str) -> String {
        let mut mac =
            HmacSha1::new_from_slice(&self.secret_key).expect("HMAC accepts any key length");
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(value.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for SecureCookieSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookieSerializer").finish_non_exhaustive()
    }
}

/// Compact JSON, base64 encoded. `</` is escaped so values are safe inside HTML.
pub fn encode_json(value: &Value) -> String {
    STANDARD.encode(value.to_string().replace("</", "<\\/"))
}

pub fn decode_json(encoded: &str) -> Option<Value> {
    let bytes = STANDARD.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}
