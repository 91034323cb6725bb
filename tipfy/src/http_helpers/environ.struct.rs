use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

/// The server-provided description of one incoming request.
///
/// Server adapters fill it from the wire; tests usually build it from a URL.
///
/// ```
/// use tipfy::http_helpers::Environ;
///
/// let environ = Environ::new("GET", "http://localhost:8080/people/calvin?page=2").unwrap();
/// assert_eq!(environ.host, "localhost:8080");
/// assert_eq!(environ.path_info, "/people/calvin");
/// assert_eq!(environ.query_string, "page=2");
/// ```
#[derive(Debug, Clone)]
pub struct Environ {
    pub method: String,
    pub url_scheme: String,
    pub host: String,
    pub script_name: String,
    pub path_info: String,
    pub query_string: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub remote_addr: Option<String>,
}

impl Default for Environ {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url_scheme: "http".to_string(),
            host: "localhost".to_string(),
            script_name: String::new(),
            path_info: "/".to_string(),
            query_string: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
            remote_addr: None,
        }
    }
}

impl Environ {
    /// Builds an environ for `method` and `url`. Relative URLs resolve against `http://localhost/`.
    pub fn new(method: &str, url: &str) -> Result<Self, url::ParseError> {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(url)?
            }
            Err(e) => return Err(e),
        };

        let mut host = url.host_str().unwrap_or("localhost").to_string();
        if let Some(port) = url.port() {
            host = format!("{host}:{port}");
        }

        Ok(Self {
            method: method.to_uppercase(),
            url_scheme: url.scheme().to_string(),
            host,
            path_info: percent_decode_str(url.path()).decode_utf8_lossy().into_owned(),
            query_string: url.query().unwrap_or_default().to_string(),
            ..Self::default()
        })
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn script_name(mut self, script_name: &str) -> Self {
        self.script_name = script_name.trim_end_matches('/').to_string();
        self
    }

    /// Adds a cookie to the `Cookie` header.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        let pair = format!("{name}={value}");
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        {
            Some((_, existing)) => {
                existing.push_str("; ");
                existing.push_str(&pair);
            }
            None => self.headers.push(("Cookie".to_string(), pair)),
        }
        self
    }

    /// Sets an urlencoded form body.
    pub fn form<T: Serialize>(self, form: &T) -> Result<Self, serde_urlencoded::ser::Error> {
        let body = serde_urlencoded::to_string(form)?;
        Ok(self
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body))
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
