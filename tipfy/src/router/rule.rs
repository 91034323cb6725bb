use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{Converter, RuleError};
use crate::traits_helpers::RequestHandler;

/// Arguments extracted from a matched URL, or passed to build one.
pub type RuleArgs = BTreeMap<String, String>;

/// Creates a fresh handler instance for each request.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn RequestHandler> + Send + Sync>;

/// The handler a rule dispatches to.
#[derive(Clone)]
pub enum HandlerRef {
    Factory(HandlerFactory),
    /// Resolved through the router's handler registry on first use.
    Named(String),
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Factory(_) => f.write_str("Factory(..)"),
            HandlerRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// A URL pattern bound to a name and a handler.
///
/// ```
/// use tipfy::Rule;
///
/// let rule = Rule::new("/people/<username>")
///     .name("profile")
///     .handler("handlers.ProfileHandler:show")
///     .methods(&["GET", "POST"]);
///
/// assert_eq!(rule.handler_method.as_deref(), Some("show"));
/// assert_eq!(rule.methods.as_ref().unwrap(), &["GET", "POST", "HEAD"]);
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    pub path: String,
    pub name: Option<String>,
    pub handler: Option<HandlerRef>,
    pub handler_method: Option<String>,
    pub methods: Option<Vec<String>>,
    pub subdomain: Option<String>,
    pub defaults: RuleArgs,
    pub redirect_to: Option<String>,
    pub strict_slashes: bool,
    pub build_only: bool,
}

impl Rule {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: None,
            handler: None,
            handler_method: None,
            methods: None,
            subdomain: None,
            defaults: RuleArgs::new(),
            redirect_to: None,
            strict_slashes: true,
            build_only: false,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Handler given by its registered name. `"name:method"` also selects the method.
    pub fn handler(mut self, handler: &str) -> Self {
        match handler.split_once(':') {
            Some((handler, method)) => {
                self.handler = Some(HandlerRef::Named(handler.to_string()));
                self.handler_method = Some(method.to_string());
            }
            None => self.handler = Some(HandlerRef::Named(handler.to_string())),
        }
        self
    }

    pub fn handler_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn RequestHandler> + Send + Sync + 'static,
    {
        self.handler = Some(HandlerRef::Factory(Arc::new(factory)));
        self
    }

    /// Handler constructed with `Default` for every request.
    pub fn handler_type<H>(self) -> Self
    where
        H: RequestHandler + Default + 'static,
    {
        self.handler_factory(|| Box::new(H::default()))
    }

    pub fn handler_method(mut self, method: &str) -> Self {
        self.handler_method = Some(method.to_string());
        self
    }

    /// Restricts the rule to `methods`. Allowing GET also allows HEAD.
    pub fn methods(mut self, methods: &[&str]) -> Self {
        let mut methods: Vec<String> = methods.iter().map(|m| m.to_uppercase()).collect();
        if methods.iter().any(|m| m == "GET") && !methods.iter().any(|m| m == "HEAD") {
            methods.push("HEAD".to_string());
        }
        self.methods = Some(methods);
        self
    }

    pub fn subdomain(mut self, subdomain: &str) -> Self {
        self.subdomain = Some(subdomain.to_string());
        self
    }

    pub fn default(mut self, key: &str, value: impl ToString) -> Self {
        self.defaults.insert(key.to_string(), value.to_string());
        self
    }

    /// Makes the rule a permanent redirect. Placeholders in `target` are filled from the match.
    pub fn redirect_to(mut self, target: &str) -> Self {
        self.redirect_to = Some(target.to_string());
        self
    }

    pub fn strict_slashes(mut self, strict_slashes: bool) -> Self {
        self.strict_slashes = strict_slashes;
        self
    }

    pub fn build_only(mut self) -> Self {
        self.build_only = true;
        self
    }

    /// The handler to dispatch to. Rules without a handler use their name.
    pub fn handler_ref(&self) -> Option<HandlerRef> {
        self.handler
            .clone()
            .or_else(|| self.name.clone().map(HandlerRef::Named))
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods
            .as_ref()
            .is_none_or(|methods| methods.iter().any(|m| m.eq_ignore_ascii_case(method)))
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<(?:(?P<converter>[a-zA-Z_][a-zA-Z0-9_]*)(?:\((?P<args>.*?)\))?:)?(?P<variable>[a-zA-Z_][a-zA-Z0-9_]*)>",
    )
    .unwrap()
});

#[derive(Debug, Clone)]
pub(crate) enum Part {
    Static(String),
    Variable {
        name: String,
        converter: Converter,
        validator: Regex,
    },
}

/// A parsed pattern (a path or a subdomain) with its matching regex.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub parts: Vec<Part>,
    pub regex: Regex,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, RuleError> {
        let mut parts = Vec::new();
        let mut regex = String::from("^");
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(pattern) {
            let Some(whole) = caps.get(0) else { continue };
            let name = caps["variable"].to_string();
            if whole.start() > last {
                let text = &pattern[last..whole.start()];
                regex.push_str(&regex::escape(text));
                parts.push(Part::Static(text.to_string()));
            }
            if parts
                .iter()
                .any(|part| matches!(part, Part::Variable { name: n, .. } if *n == name))
            {
                return Err(RuleError::DuplicateArgument {
                    pattern: pattern.to_string(),
                    name,
                });
            }

            let converter = Converter::parse(
                caps.name("converter").map(|m| m.as_str()),
                caps.name("args").map(|m| m.as_str()),
            )?;
            regex.push_str(&format!("(?P<{}>{})", name, converter.regex()));
            let validator = converter
                .validator()
                .map_err(|source| RuleError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })?;
            parts.push(Part::Variable {
                name,
                converter,
                validator,
            });
            last = whole.end();
        }
        if last < pattern.len() {
            let text = &pattern[last..];
            regex.push_str(&regex::escape(text));
            parts.push(Part::Static(text.to_string()));
        }
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|source| RuleError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { parts, regex })
    }

    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Variable { name, .. } => Some(name.as_str()),
            Part::Static(_) => None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.arguments().next().is_none()
    }

    pub fn match_str(&self, value: &str) -> Option<RuleArgs> {
        let caps = self.regex.captures(value)?;
        Some(
            self.arguments()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Fills the pattern from `values`. `None` if a value is missing or has the wrong format.
    pub fn build(&self, values: &RuleArgs, quote: impl Fn(&str) -> String) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Static(text) => out.push_str(text),
                Part::Variable {
                    name, validator, ..
                } => {
                    let value = values.get(name)?;
                    if !validator.is_match(value) {
                        return None;
                    }
                    out.push_str(&quote(value));
                }
            }
        }
        Some(out)
    }
}
