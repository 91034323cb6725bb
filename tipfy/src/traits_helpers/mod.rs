pub mod handler;
pub use self::handler::{HandlerFn, RequestHandler, handler_fn};

pub mod middleware;
pub use self::middleware::{Hook, Middleware, MiddlewareSpec};
