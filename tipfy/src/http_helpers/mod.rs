#[path = "body.enum.rs"]
mod body;
pub use self::body::Body;

#[path = "environ.struct.rs"]
mod environ;
pub use self::environ::Environ;

#[path = "http_request.struct.rs"]
mod http_request;
pub use self::http_request::{Params, Request, RequestLocal};

#[path = "http_response.struct.rs"]
mod http_response;
pub use self::http_response::{DEFAULT_MIMETYPE, Response, reason_phrase};

#[path = "http_method.enum.rs"]
mod http_method;
pub use self::http_method::{ALLOWED_METHODS, HttpMethod};

#[path = "into_response.rs"]
mod into_response;
pub use self::into_response::{IntoResponse, ResponseCallable, ReturnValue};

pub mod cookies;
pub use self::cookies::CookieArgs;

mod registry;
pub use self::registry::Registry;
