use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::errors::{Error, Result};
use crate::http_helpers::{Response, ReturnValue};
use crate::tipfy_application::Tipfy;

/// Lifecycle points where middleware can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    PostMakeApp,
    PreRunApp,
    PreDispatchHandler,
    PostDispatchHandler,
    PreDispatch,
    PostDispatch,
    HandleException,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Hook::PostMakeApp,
        Hook::PreRunApp,
        Hook::PreDispatchHandler,
        Hook::PostDispatchHandler,
        Hook::PreDispatch,
        Hook::PostDispatch,
        Hook::HandleException,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::PostMakeApp => "post_make_app",
            Hook::PreRunApp => "pre_run_app",
            Hook::PreDispatchHandler => "pre_dispatch_handler",
            Hook::PostDispatchHandler => "post_dispatch_handler",
            Hook::PreDispatch => "pre_dispatch",
            Hook::PostDispatch => "post_dispatch",
            Hook::HandleException => "handle_exception",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }

    /// Post-processing and exception hooks unwind in reverse declaration order.
    pub fn is_reversed(&self) -> bool {
        matches!(
            self,
            Hook::PostDispatch | Hook::HandleException | Hook::PostDispatchHandler
        )
    }
}

/// Middleware for the application or for request handlers.
///
/// Every hook has a no-op default. Only the hooks listed by
/// [`Middleware::hooks`] are called.
///
/// Instances are shared by every owner that uses them, so per-request state
/// belongs in the request, not in `self`.
pub trait Middleware: Send + Sync {
    fn hooks(&self) -> &'static [Hook];

    /// Called once when the application is built. May replace the application.
    fn post_make_app(&self, app: Tipfy) -> Tipfy {
        app
    }

    /// Called once by the server adapter before serving.
    fn pre_run_app(&self, app: Tipfy) -> Tipfy {
        app
    }

    /// Before the URL is matched. A value skips routing and dispatch.
    fn pre_dispatch_handler(&self, _cx: &mut Context<'_>) -> Result<Option<ReturnValue>> {
        Ok(None)
    }

    fn post_dispatch_handler(&self, _cx: &mut Context<'_>, response: Response) -> Result<Response> {
        Ok(response)
    }

    /// Before the handler method. A value is used instead of calling the method.
    fn pre_dispatch(&self, _cx: &mut Context<'_>) -> Result<Option<ReturnValue>> {
        Ok(None)
    }

    fn post_dispatch(&self, _cx: &mut Context<'_>, rv: ReturnValue) -> Result<ReturnValue> {
        Ok(rv)
    }

    /// A value becomes the response; `None` passes the error on.
    fn handle_exception(&self, _cx: &mut Context<'_>, _error: &Error) -> Option<ReturnValue> {
        None
    }
}

fn construct<M: Middleware + Default + 'static>() -> Arc<dyn Middleware> {
    Arc::new(M::default())
}

/// How an owner declares one of its middleware.
#[derive(Clone)]
pub enum MiddlewareSpec {
    /// An already constructed middleware, used as-is.
    Instance(Arc<dyn Middleware>),
    /// A middleware type, constructed once per process.
    Type {
        id: &'static str,
        construct: fn() -> Arc<dyn Middleware>,
    },
    /// A name registered with the middleware factory.
    Named(String),
}

impl MiddlewareSpec {
    pub fn instance(middleware: impl Middleware + 'static) -> Self {
        MiddlewareSpec::Instance(Arc::new(middleware))
    }

    pub fn of<M: Middleware + Default + 'static>() -> Self {
        MiddlewareSpec::Type {
            id: std::any::type_name::<M>(),
            construct: construct::<M>,
        }
    }

    pub fn named(name: &str) -> Self {
        MiddlewareSpec::Named(name.to_string())
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareSpec {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        MiddlewareSpec::Instance(middleware)
    }
}

impl From<&str> for MiddlewareSpec {
    fn from(name: &str) -> Self {
        MiddlewareSpec::named(name)
    }
}

impl fmt::Debug for MiddlewareSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareSpec::Instance(_) => f.write_str("Instance(..)"),
            MiddlewareSpec::Type { id, .. } => f.debug_tuple("Type").field(id).finish(),
            MiddlewareSpec::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}
