use crate::context::Context;
use crate::errors::Result;
use crate::http_helpers::{Response, ReturnValue};
use crate::traits_helpers::{Hook, Middleware};

use super::SessionStore;

/// Saves the sessions of the request into the response.
///
/// Works as application middleware (after the response is built) and as
/// handler middleware (after the handler method). Requests that never
/// touched a session are left alone.
#[derive(Debug, Default)]
pub struct SessionMiddleware;

impl Middleware for SessionMiddleware {
    fn hooks(&self) -> &'static [Hook] {
        &[Hook::PostDispatchHandler, Hook::PostDispatch]
    }

    fn post_dispatch_handler(&self, cx: &mut Context<'_>, mut response: Response) -> Result<Response> {
        if let Some(store) = cx.request.local.registry.get_mut::<SessionStore>() {
            store.save_sessions(&mut response)?;
        }
        Ok(response)
    }

    fn post_dispatch(&self, cx: &mut Context<'_>, rv: ReturnValue) -> Result<ReturnValue> {
        if !cx.request.local.registry.contains::<SessionStore>() {
            return Ok(rv);
        }
        let response = cx.app.make_response(cx.request, rv)?;
        self.post_dispatch_handler(cx, response).map(ReturnValue::Response)
    }
}
