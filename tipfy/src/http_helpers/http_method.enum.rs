use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    PATCH,
    OPTIONS,
    TRACE,
    CONNECT,
}

const NAMES: [(HttpMethod, &str); 9] = [
    (HttpMethod::GET, "GET"),
    (HttpMethod::POST, "POST"),
    (HttpMethod::PUT, "PUT"),
    (HttpMethod::DELETE, "DELETE"),
    (HttpMethod::HEAD, "HEAD"),
    (HttpMethod::PATCH, "PATCH"),
    (HttpMethod::OPTIONS, "OPTIONS"),
    (HttpMethod::TRACE, "TRACE"),
    (HttpMethod::CONNECT, "CONNECT"),
];

/// Methods an application accepts before routing. Anything else is answered with 501.
pub const ALLOWED_METHODS: [HttpMethod; 7] = [
    HttpMethod::DELETE,
    HttpMethod::GET,
    HttpMethod::HEAD,
    HttpMethod::OPTIONS,
    HttpMethod::POST,
    HttpMethod::PUT,
    HttpMethod::TRACE,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method {:?}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(method, _)| method == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Name of the handler function serving this method (`get`, `post`, ...).
    pub fn handler_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether `method` is one of [`ALLOWED_METHODS`], spelled in uppercase as on the wire.
    pub fn is_allowed(method: &str) -> bool {
        NAMES
            .iter()
            .find(|(_, name)| *name == method)
            .is_some_and(|(method, _)| ALLOWED_METHODS.contains(method))
    }
}

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(method, _)| *method)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
