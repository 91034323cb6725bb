use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Attributes written along with a cookie.
///
/// Deserializes from the `cookie_args` mapping of the sessions config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieArgs {
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: String,
    pub secure: Option<bool>,
    pub httponly: bool,
}

impl Default for CookieArgs {
    fn default() -> Self {
        Self {
            max_age: None,
            domain: None,
            path: "/".to_string(),
            secure: None,
            httponly: false,
        }
    }
}

impl CookieArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, max_age: Option<i64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn httponly(mut self, httponly: bool) -> Self {
        self.httponly = httponly;
        self
    }
}

/// Renders a `Set-Cookie` header value.
pub fn dump_cookie(name: &str, value: &str, args: &CookieArgs, now: DateTime<Utc>) -> String {
    let mut parts = vec![format!("{name}={value}")];
    if let Some(domain) = &args.domain {
        parts.push(format!("Domain={domain}"));
    }
    if let Some(max_age) = args.max_age {
        // Past chrono's range only Max-Age is sent.
        let expires = Duration::try_seconds(max_age).and_then(|age| now.checked_add_signed(age));
        if let Some(expires) = expires {
            parts.push(format!("Expires={}", expires.format(EXPIRES_FORMAT)));
        }
        parts.push(format!("Max-Age={max_age}"));
    }
    if args.secure.unwrap_or(false) {
        parts.push("Secure".to_string());
    }
    if args.httponly {
        parts.push("HttpOnly".to_string());
    }
    parts.push(format!("Path={}", args.path));
    parts.join("; ")
}

/// Renders a `Set-Cookie` header value that makes the client drop the cookie.
pub fn dump_deleted_cookie(name: &str, path: &str, domain: Option<&str>) -> String {
    let mut parts = vec![format!("{name}=")];
    if let Some(domain) = domain {
        parts.push(format!("Domain={domain}"));
    }
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string());
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Path={path}"));
    parts.join("; ")
}

/// Parses a `Cookie` request header. The first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
    cookies
}

/// Name and value of a `Set-Cookie` header, plus whether it deletes the cookie.
pub fn parse_set_cookie(header: &str) -> Option<(String, String, bool)> {
    let mut attributes = header.split(';');
    let (name, value) = attributes.next()?.split_once('=')?;
    let deleted = attributes.any(|attr| {
        attr.trim()
            .split_once('=')
            .is_some_and(|(key, value)| key.eq_ignore_ascii_case("max-age") && value.trim() == "0")
    });
    Some((name.trim().to_string(), value.trim().to_string(), deleted))
}
