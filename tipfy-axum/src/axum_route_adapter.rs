use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{
    body::to_bytes,
    http::{HeaderName, HeaderValue, Request, Response, StatusCode, header},
};
use tipfy::http_helpers::{Environ, Response as TipfyResponse};
use tipfy::{HttpException, Tipfy, Unhandled};
use tracing::{debug, error, warn};

/// Largest request body buffered for the application unless configured otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A request body larger than the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyTooLarge {
    pub limit: usize,
}

impl fmt::Display for BodyTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request body exceeds {} bytes", self.limit)
    }
}

impl std::error::Error for BodyTooLarge {}

pub struct AxumRouteAdapter;

impl AxumRouteAdapter {
    /// Describes an axum request the way a WSGI server fills an environ.
    pub async fn adapt_request(request: Request<axum::body::Body>) -> Result<Environ> {
        Self::adapt_request_with_limit(request, DEFAULT_BODY_LIMIT).await
    }

    /// Like [`adapt_request`](Self::adapt_request), failing with [`BodyTooLarge`]
    /// when the body is longer than `body_limit` bytes.
    pub async fn adapt_request_with_limit(
        request: Request<axum::body::Body>,
        body_limit: usize,
    ) -> Result<Environ> {
        let (parts, body) = request.into_parts();
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|length| length > body_limit) {
            return Err(BodyTooLarge { limit: body_limit }.into());
        }
        // Streamed bodies without Content-Length hit the limit here.
        let body = to_bytes(body, body_limit)
            .await
            .map_err(|e| anyhow::Error::new(BodyTooLarge { limit: body_limit }).context(e))?;

        let headers: Vec<(String, String)> = parts
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
            .collect();
        let host = parts
            .headers
            .get("host")
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or("localhost")
            .to_string();
        let scheme = Self::scheme(&parts);

        let path = parts
            .uri
            .path_and_query()
            .map(|path| path.as_str())
            .unwrap_or("/");
        let mut environ = Environ::new(parts.method.as_str(), &format!("{scheme}://{host}{path}"))
            .map_err(|e| anyhow!("Failed to parse request url {}: {e}", parts.uri))?;
        environ.headers = headers;
        environ.body = body.to_vec();
        environ.remote_addr = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(environ)
    }

    /// `X-Forwarded-Proto` from a terminating proxy, else the request URI, else `http`.
    fn scheme(parts: &axum::http::request::Parts) -> String {
        let forwarded = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| matches!(value.to_ascii_lowercase().as_str(), "http" | "https"));
        forwarded
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http")
            .to_ascii_lowercase()
    }

    pub fn adapt_response(response: TipfyResponse) -> Result<Response<axum::body::Body>> {
        let status =
            StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut res = Response::builder()
            .status(status)
            .body(axum::body::Body::from(response.body.to_bytes()))
            .map_err(|e| anyhow!("Failed to build response: {}", e))?;

        // `append` keeps every Set-Cookie header.
        for (name, value) in &response.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                res.headers_mut().append(name, value);
            }
        }
        Ok(res)
    }

    /// Runs the application on the blocking pool, since handlers are synchronous.
    pub async fn handle_request(
        request: Request<axum::body::Body>,
        app: Arc<Tipfy>,
    ) -> Result<Response<axum::body::Body>> {
        Self::handle_request_with_limit(request, app, DEFAULT_BODY_LIMIT).await
    }

    /// Like [`handle_request`](Self::handle_request); bodies over `body_limit`
    /// bytes are answered with 413 without reaching the application.
    pub async fn handle_request_with_limit(
        request: Request<axum::body::Body>,
        app: Arc<Tipfy>,
        body_limit: usize,
    ) -> Result<Response<axum::body::Body>> {
        let environ = match Self::adapt_request_with_limit(request, body_limit).await {
            Ok(environ) => environ,
            Err(e) if e.downcast_ref::<BodyTooLarge>().is_some() => {
                warn!(limit = body_limit, "request body too large");
                return Self::adapt_response(
                    HttpException::new(413)
                        .with_description(format!("The request body exceeds {body_limit} bytes."))
                        .get_response(),
                );
            }
            Err(e) => return Err(e),
        };
        let result = tokio::task::spawn_blocking(move || app.call(environ))
            .await
            .context("Request handler panicked")?;

        match result {
            Ok(response) => Self::adapt_response(response),
            Err(unhandled) => Self::adapt_response(Self::debug_response(unhandled)),
        }
    }

    /// What a debug application answers for an error nothing handled.
    ///
    /// HTTP errors keep their own response; anything else is a 500 listing
    /// the error chain.
    fn debug_response(unhandled: Unhandled) -> TipfyResponse {
        let path = unhandled.request.path.clone();
        if let Some(http) = unhandled.error.as_http() {
            debug!(path = %path, status = http.code, "http exception");
            return http.get_response();
        }
        let error = anyhow::Error::new(unhandled.error);
        error!(path = %path, error = ?error, "unhandled exception");

        let mut body = format!("Unhandled exception while serving {path}\n\n");
        for (depth, cause) in error.chain().enumerate() {
            body.push_str(&format!("{depth}: {cause}\n"));
        }
        let mut response = TipfyResponse::new(body).with_status(500);
        response.set_header("Content-Type", "text/plain; charset=utf-8");
        response
    }
}
