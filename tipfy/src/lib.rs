//! # tipfy
//!
//! A minimalist web micro-framework: URL routing with reverse building,
//! class-like request handlers, middleware hooks at the application and
//! handler level, and sessions stored in signed cookies.
//!
//! ```
//! use tipfy::{Context, RequestHandler, Result, ReturnValue, Rule, RuleArgs, TipfyFactory};
//! use tipfy::http_helpers::Environ;
//!
//! #[derive(Default)]
//! struct HelloHandler;
//!
//! impl RequestHandler for HelloHandler {
//!     fn methods(&self) -> &[&'static str] {
//!         &["get"]
//!     }
//!
//!     fn call(&mut self, _method: &str, cx: &mut Context<'_>, args: &RuleArgs) -> Result<ReturnValue> {
//!         Ok(format!("Hello, {}! ({})", args["name"], cx.request.method).into())
//!     }
//! }
//!
//! let app = TipfyFactory::new()
//!     .rules(vec![Rule::new("/hello/<name>").name("hello").handler("hello")])
//!     .register_handler::<HelloHandler>("hello")
//!     .create()
//!     .unwrap();
//!
//! let response = app.call(Environ::new("GET", "/hello/calvin").unwrap()).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(response.data(), "Hello, calvin! (GET)");
//! ```

pub mod context;
pub mod errors;
pub mod http_helpers;
pub mod middleware;
pub mod router;
pub mod sessions;
pub mod testing;
mod tipfy_application;
pub mod tipfy_factory;
pub mod traits_helpers;

pub use context::Context;
pub use errors::{Error, HttpException, RequestRedirect, Result, abort};
pub use http_helpers::{Body, Environ, HttpMethod, IntoResponse, Request, Response, ReturnValue};
pub use middleware::ETagMiddleware;
pub use router::{
    BuildArgs, HandlerPrefix, NamePrefix, Router, Rule, RuleArgs, RuleFactory, Subdomain, Submount,
};
pub use sessions::{SessionMiddleware, SessionStore};
pub use tipfy_application::{MODULE, Tipfy, TipfyDefaults, Unhandled, WsgiApplication};
pub use tipfy_factory::TipfyFactory;
pub use traits_helpers::{
    HandlerFn, Hook, Middleware, MiddlewareSpec, RequestHandler, handler_fn,
};

pub use tipfy_config::{Config, ModuleConfig, REQUIRED_VALUE};
