mod etag;
mod factory;

pub use etag::ETagMiddleware;
pub use factory::{HookMap, MiddlewareConstructor, MiddlewareFactory};
