use crate::context::Context;
use crate::errors::{HttpException, Result};
use crate::http_helpers::{ALLOWED_METHODS, ReturnValue};
use crate::router::RuleArgs;
use crate::traits_helpers::{Hook, MiddlewareSpec};

/// A class-like request handler: one instance per request, one function per HTTP method.
///
/// ```
/// use tipfy::{Context, RequestHandler, Result, ReturnValue, RuleArgs};
///
/// #[derive(Default)]
/// struct HelloHandler;
///
/// impl RequestHandler for HelloHandler {
///     fn methods(&self) -> &[&'static str] {
///         &["get"]
///     }
///
///     fn call(&mut self, method: &str, cx: &mut Context<'_>, _args: &RuleArgs) -> Result<ReturnValue> {
///         Ok(format!("Method: {}", cx.request.method).into())
///     }
/// }
/// ```
pub trait RequestHandler: Send {
    /// Lowercase names of the methods [`RequestHandler::call`] implements.
    fn methods(&self) -> &[&'static str];

    fn call(&mut self, method: &str, cx: &mut Context<'_>, args: &RuleArgs) -> Result<ReturnValue>;

    fn middleware(&self) -> Vec<MiddlewareSpec> {
        Vec::new()
    }

    /// Key under which the middleware of this handler type is cached.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Dispatches to the method selected by the matched rule, or named after
    /// the request method, with the matched rule arguments.
    fn dispatch(&mut self, cx: &mut Context<'_>) -> Result<ReturnValue> {
        let method = cx
            .request
            .local
            .rule
            .as_ref()
            .and_then(|rule| rule.handler_method.clone())
            .unwrap_or_else(|| cx.request.method.to_lowercase());
        let args = cx.request.local.rule_args.clone();
        execute(self, cx, &method, &args)
    }

    /// Dispatches to an explicit method with explicit arguments.
    fn dispatch_method(
        &mut self,
        cx: &mut Context<'_>,
        method: &str,
        args: &RuleArgs,
    ) -> Result<ReturnValue> {
        execute(self, cx, method, args)
    }
}

fn execute<H: RequestHandler + ?Sized>(
    handler: &mut H,
    cx: &mut Context<'_>,
    method: &str,
    args: &RuleArgs,
) -> Result<ReturnValue> {
    if !handler.methods().contains(&method) {
        let valid_methods = ALLOWED_METHODS
            .iter()
            .map(|m| m.as_str())
            .filter(|m| handler.methods().contains(&m.to_lowercase().as_str()))
            .map(str::to_string)
            .collect();
        return Err(HttpException::method_not_allowed(valid_methods).into());
    }

    let specs = handler.middleware();
    if specs.is_empty() {
        return handler.call(method, cx, args);
    }

    let middleware = cx.app.get_middleware(handler.name(), &specs)?;

    let mut rv = None;
    for hook in middleware.get(Hook::PreDispatch) {
        if let Some(value) = hook.pre_dispatch(cx)? {
            rv = Some(value);
            break;
        }
    }

    let mut rv = match rv {
        Some(rv) => rv,
        None => match handler.call(method, cx, args) {
            Ok(rv) => rv,
            Err(error) => middleware
                .get(Hook::HandleException)
                .iter()
                .find_map(|hook| hook.handle_exception(cx, &error).filter(|rv| !rv.is_nothing()))
                .ok_or(error)?,
        },
    };

    for hook in middleware.get(Hook::PostDispatch) {
        rv = hook.post_dispatch(cx, rv)?;
    }
    Ok(rv)
}

type HandlerFnCallback =
    dyn Fn(&str, &mut Context<'_>, &RuleArgs) -> Result<ReturnValue> + Send + Sync;

/// A handler made of a closure serving a fixed set of methods.
pub struct HandlerFn {
    methods: Vec<&'static str>,
    middleware: Vec<MiddlewareSpec>,
    name: &'static str,
    callback: Box<HandlerFnCallback>,
}

impl HandlerFn {
    pub fn with_middleware(mut self, middleware: Vec<MiddlewareSpec>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Middleware is cached per name, so closures with different middleware need distinct names.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

pub fn handler_fn<F>(methods: &[&'static str], callback: F) -> HandlerFn
where
    F: Fn(&str, &mut Context<'_>, &RuleArgs) -> Result<ReturnValue> + Send + Sync + 'static,
{
    HandlerFn {
        methods: methods.to_vec(),
        middleware: Vec::new(),
        name: std::any::type_name::<F>(),
        callback: Box::new(callback),
    }
}

impl RequestHandler for HandlerFn {
    fn methods(&self) -> &[&'static str] {
        &self.methods
    }

    fn call(&mut self, method: &str, cx: &mut Context<'_>, args: &RuleArgs) -> Result<ReturnValue> {
        (self.callback)(method, cx, args)
    }

    fn middleware(&self) -> Vec<MiddlewareSpec> {
        self.middleware.clone()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
