use std::sync::Arc;

use tipfy_config::Config;
use tracing::debug;

use crate::errors::Result;
use crate::middleware::MiddlewareFactory;
use crate::router::{HandlerFactory, HandlerRegistry, Router, Rule, RuleFactory};
use crate::sessions::{SessionBackend, SessionBackends, SessionsDefaults};
use crate::tipfy_application::{MODULE, Tipfy, TipfyDefaults};
use crate::traits_helpers::{Hook, Middleware, MiddlewareSpec, RequestHandler};

/// Builds a [`Tipfy`] application.
///
/// ```
/// use tipfy::{Rule, TipfyFactory, handler_fn};
/// use tipfy::http_helpers::Environ;
///
/// let app = TipfyFactory::new()
///     .rules(vec![Rule::new("/").name("home").handler("home")])
///     .register_handler_factory("home", || {
///         Box::new(handler_fn(&["get"], |_, _, _| Ok("Hello, World!".into())))
///     })
///     .create()
///     .unwrap();
///
/// let response = app.call(Environ::new("GET", "/").unwrap()).unwrap();
/// assert_eq!(response.data(), "Hello, World!");
/// ```
#[derive(Default)]
pub struct TipfyFactory {
    rules: Vec<Rule>,
    config: Option<Config>,
    debug: Option<bool>,
    middleware: Vec<MiddlewareSpec>,
    middleware_factory: MiddlewareFactory,
    handlers: HandlerRegistry,
    session_backends: SessionBackends,
}

impl TipfyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&mut self, rules: impl RuleFactory) -> &mut Self {
        self.rules.extend(rules.get_rules());
        self
    }

    pub fn config(&mut self, config: Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    /// Overrides the `debug` key of the `tipfy` config module.
    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.debug = Some(debug);
        self
    }

    /// Adds application middleware, after the ones named in the config.
    pub fn use_middleware(&mut self, middleware: impl Into<MiddlewareSpec>) -> &mut Self {
        self.middleware.push(middleware.into());
        self
    }

    /// Makes middleware available by name, to handlers and to the `middleware` config key.
    pub fn register_middleware<F>(&mut self, name: &str, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.middleware_factory.register(name, constructor);
        self
    }

    pub fn register_middleware_type<M: Middleware + Default + 'static>(&mut self, name: &str) -> &mut Self {
        self.middleware_factory.register_type::<M>(name);
        self
    }

    /// Makes `H` available to rules referencing `name`.
    pub fn register_handler<H: RequestHandler + Default + 'static>(&mut self, name: &str) -> &mut Self {
        self.handlers.register::<H>(name);
        self
    }

    pub fn register_handler_factory<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn RequestHandler> + Send + Sync + 'static,
    {
        self.handlers.register_factory(name, Arc::new(factory));
        self
    }

    /// Registers a loader that runs the first time `name` is dispatched to.
    pub fn register_handler_lazy<F>(&mut self, name: &str, loader: F) -> &mut Self
    where
        F: Fn() -> HandlerFactory + Send + Sync + 'static,
    {
        self.handlers.register_lazy(name, loader);
        self
    }

    pub fn session_backend(&mut self, name: &str, backend: impl SessionBackend + 'static) -> &mut Self {
        self.session_backends.register(name, backend);
        self
    }

    /// Builds the application and runs the `post_make_app` hooks.
    pub fn create(&mut self) -> Result<Tipfy> {
        let config = self.config.take().unwrap_or_default();
        config.register::<TipfyDefaults>();
        config.register::<SessionsDefaults>();

        let debug = match self.debug {
            Some(debug) => debug,
            None => config.get_as(MODULE, "debug")?,
        };
        let server_name: Option<String> = config.get_as(MODULE, "server_name")?;
        let default_subdomain: String = config.get_as(MODULE, "default_subdomain")?;

        let mut router = Router::new(std::mem::take(&mut self.rules))?
            .with_server_name(server_name)
            .with_default_subdomain(&default_subdomain);
        *router.handlers_mut() = std::mem::take(&mut self.handlers);

        let mut specs: Vec<MiddlewareSpec> = config
            .get_as::<Vec<String>>(MODULE, "middleware")?
            .iter()
            .map(|name| MiddlewareSpec::named(name))
            .collect();
        specs.append(&mut self.middleware);

        let middleware_factory = std::mem::take(&mut self.middleware_factory);
        let middleware = middleware_factory.get_middleware(std::any::type_name::<Tipfy>(), &specs)?;

        let debug_enabled = debug;
        debug!(
            rules = router.map().len(),
            middleware = specs.len(),
            debug = debug_enabled,
            "application created"
        );

        let app = Tipfy {
            config,
            router,
            debug,
            middleware_factory,
            middleware,
            session_backends: Arc::new(std::mem::take(&mut self.session_backends)),
        };
        let hooks = app.middleware.get(Hook::PostMakeApp).to_vec();
        Ok(hooks.iter().fold(app, |app, hook| hook.post_make_app(app)))
    }
}
