//! In-process client for exercising an application without a server.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::http_helpers::cookies::parse_set_cookie;
use crate::http_helpers::{Environ, Response};
use crate::tipfy_application::{Tipfy, Unhandled};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    Unhandled(#[from] Unhandled),
}

/// Sends requests straight to [`Tipfy::call`], keeping the cookies the
/// application sets between requests, like a browser would.
#[derive(Debug)]
pub struct TestClient<'a> {
    app: &'a Tipfy,
    cookies: BTreeMap<String, String>,
}

impl<'a> TestClient<'a> {
    pub fn new(app: &'a Tipfy) -> Self {
        Self {
            app,
            cookies: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, url: &str) -> Result<Response, ClientError> {
        self.open(Environ::new("GET", url)?)
    }

    pub fn post<T: Serialize>(&mut self, url: &str, form: &T) -> Result<Response, ClientError> {
        self.open(Environ::new("POST", url)?.form(form)?)
    }

    pub fn request(&mut self, method: &str, url: &str) -> Result<Response, ClientError> {
        self.open(Environ::new(method, url)?)
    }

    /// Sends `environ` with the stored cookies added.
    pub fn open(&mut self, mut environ: Environ) -> Result<Response, ClientError> {
        for (name, value) in &self.cookies {
            environ = environ.cookie(name, value);
        }

        let response = self.app.call(environ)?;
        for (name, value, deleted) in response.set_cookies().into_iter().filter_map(parse_set_cookie) {
            if deleted {
                self.cookies.remove(&name);
            } else {
                self.cookies.insert(name, value);
            }
        }
        Ok(response)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }
}
