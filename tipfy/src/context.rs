use serde_json::Value;
use url::Url;

use crate::errors::{Error, Result, abort};
use crate::http_helpers::{Request, Response};
use crate::router::{BuildArgs, RuleArgs};
use crate::sessions::{SessionDict, SessionStore};
use crate::tipfy_application::Tipfy;

/// What handlers and middleware see of the current request.
///
/// Request-scoped state lives in [`Request::local`], so nothing here
/// outlives the request.
pub struct Context<'a> {
    pub app: &'a Tipfy,
    pub request: &'a mut Request,
}

impl<'a> Context<'a> {
    pub fn new(app: &'a Tipfy, request: &'a mut Request) -> Self {
        Self { app, request }
    }

    /// Arguments of the matched rule.
    pub fn rule_args(&self) -> &RuleArgs {
        &self.request.local.rule_args
    }

    pub fn url_for(&self, name: &str, args: &BuildArgs) -> Result<String> {
        self.app.url_for(self.request, name, args)
    }

    /// A redirect to `location`, resolved against the current URL when relative.
    pub fn redirect(&self, location: &str, code: u16) -> Response {
        let location = Url::parse(&self.request.url())
            .and_then(|base| base.join(location))
            .map(String::from)
            .unwrap_or_else(|_| location.to_string());
        Response::redirect(&location, code)
    }

    pub fn redirect_to(&self, name: &str, args: &BuildArgs, code: u16) -> Result<Response> {
        let location = self.url_for(name, &args.clone().full())?;
        Ok(Response::redirect(&location, code))
    }

    pub fn abort(&self, code: u16) -> Error {
        abort(code)
    }

    pub fn get_config(&self, module: &str, key: &str) -> Result<Value> {
        self.app.get_config(module, key)
    }

    /// The session store of this request, created on first use.
    pub fn session_store(&mut self) -> Result<&mut SessionStore> {
        let app = self.app;
        let request = &mut *self.request;
        let cookies = &request.cookies;
        request
            .local
            .registry
            .get_or_try_insert_with(|| SessionStore::new(app, cookies))
    }

    /// The default session.
    pub fn session(&mut self) -> Result<&mut SessionDict> {
        self.session_store()?.get_session()
    }
}
