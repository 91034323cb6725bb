//! URL routing: rules, matching and reverse building.

mod converters;
mod handler_registry;
mod map;
mod rule;
mod rule_factory;

use std::sync::Arc;

use url::{Position, Url};

pub use converters::{Converter, url_quote};
pub use handler_registry::{HandlerLoader, HandlerRegistry};
pub use map::{BuildError, MapAdapter, RouteMatch, RuleError, UrlMap};
pub use rule::{HandlerFactory, HandlerRef, Rule, RuleArgs};
pub use rule_factory::{HandlerPrefix, NamePrefix, RuleFactory, Subdomain, Submount};

use crate::errors::{Error, Result};
use crate::http_helpers::Request;

/// Arguments for [`Router::url_for`].
///
/// Besides the rule values it carries the special options `_full`,
/// `_method`, `_scheme`, `_netloc` and `_anchor`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    pub values: RuleArgs,
    pub full: bool,
    pub method: Option<String>,
    pub scheme: Option<String>,
    pub netloc: Option<String>,
    pub anchor: Option<String>,
}

impl BuildArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits keyword arguments into rule values and the special `_` options.
    pub fn from_kwargs<K, V, I>(kwargs: I) -> Self
    where
        K: AsRef<str>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut args = Self::new();
        for (key, value) in kwargs {
            let value = value.to_string();
            match key.as_ref() {
                "_full" => args.full = !matches!(value.as_str(), "" | "0" | "false" | "False"),
                "_method" => args.method = Some(value),
                "_scheme" => args.scheme = Some(value),
                "_netloc" => args.netloc = Some(value),
                "_anchor" => args.anchor = Some(value),
                key => {
                    args.values.insert(key.to_string(), value);
                }
            }
        }
        args
    }

    pub fn arg(mut self, key: &str, value: impl ToString) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn full(mut self) -> Self {
        self.full = true;
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_uppercase());
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    pub fn netloc(mut self, netloc: &str) -> Self {
        self.netloc = Some(netloc.to_string());
        self
    }

    pub fn anchor(mut self, anchor: &str) -> Self {
        self.anchor = Some(anchor.to_string());
        self
    }
}

/// Matches requests to rules and builds URLs for named rules.
#[derive(Debug)]
pub struct Router {
    map: Arc<UrlMap>,
    handlers: HandlerRegistry,
    server_name: Option<String>,
}

impl Router {
    pub fn new(rules: impl RuleFactory) -> std::result::Result<Self, RuleError> {
        Ok(Self {
            map: Arc::new(UrlMap::new(rules.get_rules())?),
            handlers: HandlerRegistry::new(),
            server_name: None,
        })
    }

    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    pub fn with_default_subdomain(mut self, default_subdomain: &str) -> Self {
        Arc::make_mut(&mut self.map).default_subdomain = default_subdomain.to_string();
        self
    }

    pub fn add(&mut self, rules: impl RuleFactory) -> std::result::Result<(), RuleError> {
        let map = Arc::make_mut(&mut self.map);
        for rule in rules.get_rules() {
            map.add(rule)?;
        }
        Ok(())
    }

    pub fn map(&self) -> &UrlMap {
        &self.map
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    /// Binds the rule map to the host of `request`.
    pub fn bind(&self, request: &Request) -> MapAdapter {
        self.map.bind(
            self.server_name.as_deref(),
            request.scheme(),
            request.host(),
            request.script_root(),
        )
    }

    /// Matches `request`, storing the bound adapter and, on success, the
    /// rule and its arguments in the request-local state.
    pub fn match_request(&self, request: &mut Request) -> RouteMatch {
        if request.local.url_adapter.is_none() {
            request.local.url_adapter = Some(self.bind(request));
        }
        let Some(adapter) = request.local.url_adapter.as_ref() else {
            return RouteMatch::NotFound;
        };

        let matched = adapter.match_path(&request.path, &request.method, &request.environ.query_string);
        if let RouteMatch::Matched { rule, args } = &matched {
            request.local.rule = Some(Arc::clone(rule));
            request.local.rule_args = args.clone();
        }
        matched
    }

    /// Builds the URL of the rule named `name`.
    pub fn url_for(
        &self,
        request: &Request,
        name: &str,
        args: &BuildArgs,
    ) -> std::result::Result<String, BuildError> {
        let bound;
        let adapter = match &request.local.url_adapter {
            Some(adapter) => adapter,
            None => {
                bound = self.bind(request);
                &bound
            }
        };

        let method = args.method.as_deref();
        let mut url = if args.scheme.is_some() || args.netloc.is_some() {
            let external = adapter.build(name, &args.values, method, true)?;
            replace_origin(&external, args.scheme.as_deref(), args.netloc.as_deref())
                .ok_or_else(|| BuildError {
                    name: name.to_string(),
                    reason: format!("{external:?} is not an absolute url"),
                })?
        } else {
            adapter.build(name, &args.values, method, args.full)?
        };

        if let Some(anchor) = &args.anchor {
            url.push('#');
            url.push_str(&url_quote(anchor));
        }
        Ok(url)
    }

    /// The handler factory of `rule`, resolving registered names once.
    pub fn resolve_handler(&self, rule: &Rule) -> Result<HandlerFactory> {
        match rule.handler_ref() {
            Some(HandlerRef::Factory(factory)) => Ok(factory),
            Some(HandlerRef::Named(name)) => self.handlers.resolve(&name),
            None => Err(Error::HandlerNotFound(rule.path.clone())),
        }
    }
}

/// Swaps the scheme and/or network location of an absolute url, keeping the rest.
fn replace_origin(url: &str, scheme: Option<&str>, netloc: Option<&str>) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let scheme = scheme.unwrap_or(parsed.scheme());
    let netloc = netloc.unwrap_or(&parsed[Position::BeforeHost..Position::AfterPort]);
    Some(format!("{scheme}://{netloc}{}", &parsed[Position::BeforePath..]))
}
