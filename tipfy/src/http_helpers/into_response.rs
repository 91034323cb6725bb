use std::fmt;

use serde_json::Value;

use super::{Body, Request, Response};

/// A response produced lazily from the request, the equivalent of returning a WSGI app.
pub type ResponseCallable = Box<dyn FnOnce(&Request) -> Response + Send>;

/// What a handler method or a hook returned, before it becomes a [`Response`].
pub enum ReturnValue {
    Nothing,
    Response(Response),
    Body(Body),
    Tuple {
        body: Body,
        status: u16,
        headers: Vec<(String, String)>,
    },
    Callable(ResponseCallable),
}

impl ReturnValue {
    pub fn callable<F>(f: F) -> Self
    where
        F: FnOnce(&Request) -> Response + Send + 'static,
    {
        ReturnValue::Callable(Box::new(f))
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ReturnValue::Nothing)
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnValue::Nothing => f.write_str("Nothing"),
            ReturnValue::Response(response) => f.debug_tuple("Response").field(response).finish(),
            ReturnValue::Body(body) => f.debug_tuple("Body").field(body).finish(),
            ReturnValue::Tuple {
                body,
                status,
                headers,
            } => f
                .debug_struct("Tuple")
                .field("body", body)
                .field("status", status)
                .field("headers", headers)
                .finish(),
            ReturnValue::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<()> for ReturnValue {
    fn from(_: ()) -> Self {
        ReturnValue::Nothing
    }
}

impl From<Response> for ReturnValue {
    fn from(response: Response) -> Self {
        ReturnValue::Response(response)
    }
}

impl From<Body> for ReturnValue {
    fn from(body: Body) -> Self {
        ReturnValue::Body(body)
    }
}

impl From<&str> for ReturnValue {
    fn from(text: &str) -> Self {
        ReturnValue::Body(text.into())
    }
}

impl From<String> for ReturnValue {
    fn from(text: String) -> Self {
        ReturnValue::Body(text.into())
    }
}

impl From<Value> for ReturnValue {
    fn from(json: Value) -> Self {
        ReturnValue::Body(Body::Json(json))
    }
}

impl<B: Into<Body>> From<(B, u16)> for ReturnValue {
    fn from((body, status): (B, u16)) -> Self {
        ReturnValue::Tuple {
            body: body.into(),
            status,
            headers: Vec::new(),
        }
    }
}

impl<B: Into<Body>> From<(B, u16, Vec<(String, String)>)> for ReturnValue {
    fn from((body, status, headers): (B, u16, Vec<(String, String)>)) -> Self {
        ReturnValue::Tuple {
            body: body.into(),
            status,
            headers,
        }
    }
}

impl<T: Into<ReturnValue>> From<Option<T>> for ReturnValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ReturnValue::Nothing, Into::into)
    }
}

/// Types that render themselves as a complete response.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}
