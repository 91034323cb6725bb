use thiserror::Error;
use tipfy_config::ConfigError;

use crate::http_helpers::{IntoResponse, Response, reason_phrase};
use crate::router::{BuildError, RuleError};

/// An error that maps to an HTTP status response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {}", status_name(.code))]
pub struct HttpException {
    pub code: u16,
    pub description: Option<String>,
    /// Methods reported in the `Allow` header of a 405.
    pub valid_methods: Vec<String>,
}

fn status_name(code: &u16) -> &'static str {
    reason_phrase(*code)
}

impl HttpException {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            description: None,
            valid_methods: Vec::new(),
        }
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn forbidden() -> Self {
        Self::new(403)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn method_not_allowed(valid_methods: Vec<String>) -> Self {
        Self {
            valid_methods,
            ..Self::new(405)
        }
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn not_implemented() -> Self {
        Self::new(501)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &'static str {
        reason_phrase(self.code)
    }

    pub fn get_response(&self) -> Response {
        let description = self.description.as_deref().unwrap_or_default();
        let body = format!(
            "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
             <title>{code} {name}</title>\n\
             <h1>{name}</h1>\n\
             <p>{description}</p>\n",
            code = self.code,
            name = self.name(),
        );
        let mut response = Response::new(body).with_status(self.code);
        if self.code == 405 {
            response.set_header("Allow", &self.valid_methods.join(", "));
        }
        response
    }
}

impl IntoResponse for HttpException {
    fn into_response(self) -> Response {
        self.get_response()
    }
}

/// Routing signal: the request must be answered with a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("redirect ({code}) to {location}")]
pub struct RequestRedirect {
    pub location: String,
    pub code: u16,
}

impl RequestRedirect {
    pub fn new(location: impl Into<String>, code: u16) -> Self {
        Self {
            location: location.into(),
            code,
        }
    }

    pub fn permanent(location: impl Into<String>) -> Self {
        Self::new(location, 301)
    }

    pub fn get_response(&self) -> Response {
        Response::redirect(&self.location, self.code)
    }
}

impl IntoResponse for RequestRedirect {
    fn into_response(self) -> Response {
        self.get_response()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpException),

    #[error(transparent)]
    Redirect(#[from] RequestRedirect),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("Handler {0:?} is not registered")]
    HandlerNotFound(String),

    #[error("Middleware {0:?} is not registered")]
    MiddlewareNotFound(String),

    #[error("Session backend {0:?} is not registered")]
    BackendNotFound(String),

    #[error("Handler returned no response")]
    NoResponse,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn is_http(&self) -> bool {
        matches!(self, Error::Http(_))
    }

    pub fn as_http(&self) -> Option<&HttpException> {
        match self {
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

/// Shortcut for handlers: `return Err(abort(404))`.
pub fn abort(code: u16) -> Error {
    Error::Http(HttpException::new(code))
}
