use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tipfy_config::{Config, DefaultConfig, ModuleConfig};
use tracing::{debug, error};

use crate::context::Context;
use crate::errors::{Error, HttpException, Result};
use crate::http_helpers::{Environ, HttpMethod, Request, Response, ReturnValue};
use crate::middleware::{HookMap, MiddlewareFactory};
use crate::router::{BuildArgs, RouteMatch, Router};
use crate::sessions::SessionBackends;
use crate::testing::TestClient;
use crate::traits_helpers::{Hook, MiddlewareSpec};

/// Config module of the application itself.
pub const MODULE: &str = "tipfy";

/// Defaults of the `tipfy` config module.
pub struct TipfyDefaults;

impl DefaultConfig for TipfyDefaults {
    const MODULE: &'static str = MODULE;

    fn default_config() -> ModuleConfig {
        ModuleConfig::new()
            .with("server_name", Value::Null)
            .with("default_subdomain", "")
            .with("middleware", Value::Array(Vec::new()))
            .with("debug", false)
    }
}

/// An error no middleware handled while the application runs in debug mode.
///
/// Carries the request with its local state intact, for inspection.
#[derive(Debug, Error)]
#[error("unhandled error while serving {}: {error}", .request.path)]
pub struct Unhandled {
    #[source]
    pub error: Error,
    pub request: Box<Request>,
}

/// The application: routes requests to handlers and runs the middleware.
///
/// Built by [`TipfyFactory`](crate::TipfyFactory).
#[derive(Debug)]
pub struct Tipfy {
    pub(crate) config: Config,
    pub(crate) router: Router,
    pub(crate) debug: bool,
    pub(crate) middleware_factory: MiddlewareFactory,
    pub(crate) middleware: Arc<HookMap>,
    pub(crate) session_backends: Arc<SessionBackends>,
}

pub type WsgiApplication = Tipfy;

impl Tipfy {
    /// Serves one request.
    ///
    /// Only fails in debug mode, for errors that no middleware handled.
    pub fn call(&self, environ: Environ) -> std::result::Result<Response, Unhandled> {
        let mut request = Request::from_environ(environ);
        match self.wsgi_app(&mut request) {
            Ok(response) => Ok(response),
            Err(error) => Err(Unhandled {
                error,
                request: Box::new(request),
            }),
        }
    }

    /// Serves `request`, clearing its local state unless an error is
    /// passed on in debug mode.
    pub fn wsgi_app(&self, request: &mut Request) -> Result<Response> {
        let mut cx = Context::new(self, request);
        let response = match self.process_request(&mut cx) {
            Ok(response) => response,
            Err(Error::Redirect(redirect)) => redirect.get_response(),
            Err(error) => self.handle_exception(&mut cx, error)?,
        };
        cx.request.local.clear();
        Ok(response)
    }

    fn process_request(&self, cx: &mut Context<'_>) -> Result<Response> {
        if !HttpMethod::is_allowed(&cx.request.method) {
            return Err(HttpException::not_implemented().into());
        }

        // Bound before the hooks so they can build URLs.
        cx.request.local.url_adapter = Some(self.router.bind(cx.request));

        let mut rv = None;
        for hook in self.middleware.get(Hook::PreDispatchHandler) {
            if let Some(value) = hook.pre_dispatch_handler(cx)? {
                rv = Some(value);
                break;
            }
        }
        let rv = match rv {
            Some(rv) => rv,
            None => self.dispatch(cx)?,
        };

        let mut response = self.make_response(cx.request, rv)?;
        for hook in self.middleware.get(Hook::PostDispatchHandler) {
            response = hook.post_dispatch_handler(cx, response)?;
        }
        Ok(response)
    }

    /// Matches the request and dispatches it to the handler of the matched rule.
    pub fn dispatch(&self, cx: &mut Context<'_>) -> Result<ReturnValue> {
        let rule = match self.router.match_request(cx.request) {
            RouteMatch::Matched { rule, .. } => rule,
            RouteMatch::NotFound => return Err(HttpException::not_found().into()),
            RouteMatch::MethodNotAllowed(valid_methods) => {
                return Err(HttpException::method_not_allowed(valid_methods).into());
            }
            RouteMatch::Redirect(redirect) => return Err(redirect.into()),
        };

        debug!(path = %cx.request.path, rule = %rule.path, "dispatching request");
        let factory = self.router.resolve_handler(&rule)?;
        let mut handler = factory();
        handler.dispatch(cx)
    }

    /// Turns a handler return value into a response.
    pub fn make_response(&self, request: &Request, rv: ReturnValue) -> Result<Response> {
        match rv {
            ReturnValue::Nothing => Err(Error::NoResponse),
            ReturnValue::Response(response) => Ok(response),
            ReturnValue::Body(body) => Ok(Response::new(body)),
            ReturnValue::Tuple {
                body,
                status,
                headers,
            } => {
                let mut response = Response::new(body).with_status(status);
                for (name, value) in headers {
                    if name.eq_ignore_ascii_case("Content-Type") {
                        response.set_header(&name, &value);
                    } else {
                        response.add_header(&name, &value);
                    }
                }
                Ok(response)
            }
            ReturnValue::Callable(callable) => Ok(callable(request)),
        }
    }

    /// Gives the application `handle_exception` hooks a chance to answer.
    ///
    /// In debug mode every error they leave alone is passed on. Otherwise
    /// HTTP errors become their own response and anything else a 500.
    pub fn handle_exception(&self, cx: &mut Context<'_>, error: Error) -> Result<Response> {
        let handled = self
            .middleware
            .get(Hook::HandleException)
            .iter()
            .find_map(|hook| hook.handle_exception(cx, &error).filter(|rv| !rv.is_nothing()));
        if let Some(rv) = handled {
            return self.make_response(cx.request, rv);
        }

        if self.debug {
            return Err(error);
        }
        if let Some(http) = error.as_http() {
            debug!(status = http.code, path = %cx.request.path, "http exception");
            return Ok(http.get_response());
        }

        error!(error = ?anyhow::Error::from(error), path = %cx.request.path, "unhandled exception");
        Ok(HttpException::internal_server_error().get_response())
    }

    pub fn get_config(&self, module: &str, key: &str) -> Result<Value> {
        Ok(self.config.get(module, key)?)
    }

    /// Middleware of a handler type, resolved once per `owner`.
    pub fn get_middleware(&self, owner: &str, specs: &[MiddlewareSpec]) -> Result<Arc<HookMap>> {
        self.middleware_factory.get_middleware(owner, specs)
    }

    pub fn url_for(&self, request: &Request, name: &str, args: &BuildArgs) -> Result<String> {
        Ok(self.router.url_for(request, name, args)?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Application middleware, by hook.
    pub fn middleware(&self) -> &HookMap {
        &self.middleware
    }

    pub fn session_backends(&self) -> Arc<SessionBackends> {
        Arc::clone(&self.session_backends)
    }

    /// Runs the `pre_run_app` hooks. Called by servers before they start serving.
    pub fn prepare_run(self) -> Tipfy {
        let hooks = self.middleware.get(Hook::PreRunApp).to_vec();
        hooks.iter().fold(self, |app, hook| hook.pre_run_app(app))
    }

    /// An in-process client that keeps cookies between requests.
    pub fn test_client(&self) -> TestClient<'_> {
        TestClient::new(self)
    }
}
