use chrono::Utc;
use http::StatusCode;

use super::{Body, CookieArgs, cookies};

pub const DEFAULT_MIMETYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(Body::empty())
    }
}

impl Response {
    /// A 200 response. JSON bodies get an `application/json` content type.
    pub fn new(body: impl Into<Body>) -> Self {
        let body = body.into();
        let content_type = match body {
            Body::Json(_) => "application/json",
            _ => DEFAULT_MIMETYPE,
        };
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// A redirect response with a short HTML body, like most servers send.
    pub fn redirect(location: &str, code: u16) -> Self {
        let body = format!(
            "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
             <title>Redirecting...</title>\n\
             <h1>Redirecting...</h1>\n\
             <p>You should be redirected automatically to target URL: \
             <a href=\"{location}\">{location}</a>.  If not click the link."
        );
        Self::new(body)
            .with_status(code)
            .with_header("Location", location)
    }

    pub fn status_text(&self) -> &'static str {
        reason_phrase(self.status)
    }

    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replaces every header named `name` with a single value.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.add_header(name, value);
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn set_cookie(&mut self, name: &str, value: &str, args: &CookieArgs) {
        let cookie = cookies::dump_cookie(name, value, args, Utc::now());
        self.add_header("Set-Cookie", &cookie);
    }

    pub fn delete_cookie(&mut self, name: &str, path: &str, domain: Option<&str>) {
        let cookie = cookies::dump_deleted_cookie(name, path, domain);
        self.add_header("Set-Cookie", &cookie);
    }

    /// Values of the `Set-Cookie` headers, in the order they were added.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.header_all("Set-Cookie")
    }

    pub fn data(&self) -> String {
        self.body.to_text()
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_response_defaults() {
        let response = Response::new("Hello");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some(DEFAULT_MIMETYPE));
        assert_eq!(response.data(), "Hello");

        let response = Response::new(json!({"a": 1}));
        assert_eq!(response.content_type(), Some("application/json"));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/login", 302);
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("/login"));
        assert_eq!(response.status_text(), "Found");
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(501), "Not Implemented");
        assert_eq!(reason_phrase(599), "Unknown");
        assert_eq!(reason_phrase(42), "Unknown");
    }

    #[test]
    fn test_cookies_are_appended() {
        let mut response = Response::default();
        response.set_cookie("a", "1", &CookieArgs::default());
        response.delete_cookie("b", "/", None);

        let cookies = response.set_cookies();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0], "a=1; Path=/");
        assert!(cookies[1].starts_with("b=; Expires=Thu, 01 Jan 1970"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut response = Response::default();
        response.set_header("content-type", "text/plain");
        assert_eq!(response.header_all("Content-Type"), vec!["text/plain"]);
    }
}
