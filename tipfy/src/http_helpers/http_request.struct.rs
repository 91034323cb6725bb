use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{Environ, Registry, cookies::parse_cookie_header};
use crate::router::{MapAdapter, Rule, RuleArgs};

/// Ordered multi-valued parameters (query string or form body).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn parse(encoded: &str) -> Self {
        Self(serde_urlencoded::from_str(encoded).unwrap_or_default())
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// State scoped to a single request.
///
/// Cleared by the application when the request ends, except when an error is
/// re-raised in debug mode.
#[derive(Debug, Default)]
pub struct RequestLocal {
    pub rule: Option<Arc<Rule>>,
    pub rule_args: RuleArgs,
    pub url_adapter: Option<MapAdapter>,
    pub registry: Registry,
    pub context: Map<String, Value>,
}

impl RequestLocal {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.rule.is_none()
            && self.rule_args.is_empty()
            && self.url_adapter.is_none()
            && self.registry.is_empty()
            && self.context.is_empty()
    }
}

#[derive(Debug)]
pub struct Request {
    pub environ: Environ,
    pub method: String,
    pub path: String,
    pub args: Params,
    pub form: Params,
    pub cookies: HashMap<String, String>,
    pub local: RequestLocal,
}

impl Request {
    pub fn from_environ(environ: Environ) -> Self {
        let args = Params::parse(&environ.query_string);
        let form = match environ.get_header("content-type") {
            Some(content_type) if content_type.starts_with("application/x-www-form-urlencoded") => {
                Params::parse(&String::from_utf8_lossy(&environ.body))
            }
            _ => Params::default(),
        };
        let cookies = environ
            .get_header("cookie")
            .map(parse_cookie_header)
            .unwrap_or_default();

        Self {
            method: environ.method.to_uppercase(),
            path: environ.path_info.clone(),
            args,
            form,
            cookies,
            local: RequestLocal::default(),
            environ,
        }
    }

    /// Get a specific header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.environ.get_header(name)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.environ.headers
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn host(&self) -> &str {
        &self.environ.host
    }

    pub fn scheme(&self) -> &str {
        &self.environ.url_scheme
    }

    pub fn is_secure(&self) -> bool {
        self.environ.url_scheme == "https"
    }

    pub fn script_root(&self) -> &str {
        &self.environ.script_name
    }

    /// `scheme://host/`
    pub fn host_url(&self) -> String {
        format!("{}://{}/", self.environ.url_scheme, self.environ.host)
    }

    /// The full URL without the query string.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}{}{}",
            self.environ.url_scheme, self.environ.host, self.environ.script_name, self.path
        )
    }

    /// The full URL including the query string.
    pub fn url(&self) -> String {
        let mut url = self.base_url();
        if !self.environ.query_string.is_empty() {
            url.push('?');
            url.push_str(&self.environ.query_string);
        }
        url
    }

    pub fn body(&self) -> &[u8] {
        &self.environ.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.environ.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.environ.body)
    }
}
