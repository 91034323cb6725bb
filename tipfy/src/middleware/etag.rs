use sha1::{Digest, Sha1};

use crate::context::Context;
use crate::errors::Result;
use crate::http_helpers::{Body, Response};
use crate::traits_helpers::{Hook, Middleware};

/// Adds an `ETag` to successful GET and HEAD responses and answers
/// `304 Not Modified` when the client already has the same body.
#[derive(Debug, Default)]
pub struct ETagMiddleware;

impl ETagMiddleware {
    pub fn etag(body: &Body) -> String {
        format!("\"{}\"", hex::encode(Sha1::digest(body.to_bytes())))
    }
}

impl Middleware for ETagMiddleware {
    fn hooks(&self) -> &'static [Hook] {
        &[Hook::PostDispatchHandler]
    }

    fn post_dispatch_handler(&self, cx: &mut Context<'_>, mut response: Response) -> Result<Response> {
        let cacheable = matches!(cx.request.method.as_str(), "GET" | "HEAD");
        if !cacheable || response.status != 200 || response.header("ETag").is_some() {
            return Ok(response);
        }

        let etag = Self::etag(&response.body);
        let matches = cx.request.header("If-None-Match").is_some_and(|header| {
            header
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == etag || candidate == "*")
        });

        if matches {
            let mut not_modified = Response::new(Body::empty()).with_status(304);
            not_modified.remove_header("Content-Type");
            not_modified.set_header("ETag", &etag);
            for cookie in response.set_cookies() {
                not_modified.add_header("Set-Cookie", cookie);
            }
            return Ok(not_modified);
        }

        response.set_header("ETag", &etag);
        Ok(response)
    }
}
