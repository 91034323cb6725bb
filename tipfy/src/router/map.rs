use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::converters::url_quote;
use super::rule::Pattern;
use super::{Rule, RuleArgs};
use crate::errors::RequestRedirect;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid converter {converter:?}: {reason}")]
    InvalidConverter { converter: String, reason: String },

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Argument {name:?} appears more than once in {pattern:?}")]
    DuplicateArgument { pattern: String, name: String },

    #[error("Rule path {0:?} must start with a slash")]
    MissingSlash(String),
}

/// URL building failed: unknown name, or values that fit no rule of that name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not build url for {name:?}: {reason}")]
pub struct BuildError {
    pub name: String,
    pub reason: String,
}

/// Outcome of matching a path against the rule map.
#[derive(Debug, Clone)]
pub enum RouteMatch {
    Matched { rule: Arc<Rule>, args: RuleArgs },
    NotFound,
    MethodNotAllowed(Vec<String>),
    Redirect(RequestRedirect),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub rule: Arc<Rule>,
    path: Pattern,
    subdomain: Option<Pattern>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self, RuleError> {
        if !rule.path.starts_with('/') {
            return Err(RuleError::MissingSlash(rule.path));
        }
        let path = Pattern::parse(&rule.path)?;
        let subdomain = rule.subdomain.as_deref().map(Pattern::parse).transpose()?;
        Ok(Self {
            rule: Arc::new(rule),
            path,
            subdomain,
        })
    }

    fn match_subdomain(&self, subdomain: &str, default_subdomain: &str) -> Option<RuleArgs> {
        match &self.subdomain {
            Some(pattern) => pattern.match_str(subdomain),
            None => (subdomain == default_subdomain).then(RuleArgs::new),
        }
    }

    fn arguments(&self) -> BTreeSet<&str> {
        let mut arguments: BTreeSet<&str> = self.path.arguments().collect();
        if let Some(subdomain) = &self.subdomain {
            arguments.extend(subdomain.arguments());
        }
        arguments
    }
}

/// The compiled set of rules of an application.
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    rules: Vec<CompiledRule>,
    pub default_subdomain: String,
}

impl UrlMap {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut map = Self::default();
        for rule in rules {
            map.add(rule)?;
        }
        Ok(map)
    }

    pub fn add(&mut self, rule: Rule) -> Result<(), RuleError> {
        self.rules.push(CompiledRule::compile(rule)?);
        Ok(())
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Binds the map to a host. With a `server_name`, the subdomain is the
    /// part of `host` in front of it.
    pub fn bind(
        self: &Arc<Self>,
        server_name: Option<&str>,
        url_scheme: &str,
        host: &str,
        script_name: &str,
    ) -> MapAdapter {
        let host = host.to_lowercase();
        let (server_name, subdomain) = match server_name {
            None => (host, self.default_subdomain.clone()),
            Some(server_name) => {
                let server_name = server_name.to_lowercase();
                let subdomain = if host == server_name {
                    String::new()
                } else if let Some(prefix) = host.strip_suffix(&format!(".{server_name}")) {
                    prefix.to_string()
                } else {
                    warn!(%host, %server_name, "host does not match the configured server name");
                    "<invalid>".to_string()
                };
                (server_name, subdomain)
            }
        };

        MapAdapter {
            map: Arc::clone(self),
            server_name,
            subdomain,
            url_scheme: url_scheme.to_string(),
            script_name: script_name.trim_end_matches('/').to_string(),
        }
    }
}

/// A [`UrlMap`] bound to the host of one request.
#[derive(Debug, Clone)]
pub struct MapAdapter {
    map: Arc<UrlMap>,
    pub server_name: String,
    pub subdomain: String,
    pub url_scheme: String,
    pub script_name: String,
}

impl MapAdapter {
    pub fn match_path(&self, path: &str, method: &str, query_string: &str) -> RouteMatch {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let mut allowed = BTreeSet::new();

        for compiled in &self.map.rules {
            let rule = &compiled.rule;
            if rule.build_only {
                continue;
            }
            let Some(mut args) =
                compiled.match_subdomain(&self.subdomain, &self.map.default_subdomain)
            else {
                continue;
            };

            let Some(path_args) = compiled.path.match_str(&path) else {
                if rule.strict_slashes
                    && rule.path.ends_with('/')
                    && !path.ends_with('/')
                    && rule.allows_method(method)
                    && compiled.path.match_str(&format!("{path}/")).is_some()
                {
                    let location =
                        self.make_url(&self.subdomain, &url_quote(&format!("{path}/")), query_string);
                    debug!(%location, "redirecting to the canonical slash url");
                    return RouteMatch::Redirect(RequestRedirect::permanent(location));
                }
                continue;
            };

            if !rule.allows_method(method) {
                if let Some(methods) = &rule.methods {
                    allowed.extend(methods.iter().cloned());
                }
                continue;
            }

            args.extend(path_args);
            for (key, value) in &rule.defaults {
                args.entry(key.clone()).or_insert_with(|| value.clone());
            }

            if let Some(target) = &rule.redirect_to {
                let location = self.redirect_target(target, &args);
                debug!(%location, "rule redirects");
                return RouteMatch::Redirect(RequestRedirect::permanent(location));
            }

            return RouteMatch::Matched {
                rule: Arc::clone(rule),
                args,
            };
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(allowed.into_iter().collect())
        }
    }

    /// Builds the url of the rule named `name`.
    ///
    /// Values that are not rule arguments become query parameters. The url is
    /// absolute when `force_external` is set or the rule lives on another subdomain.
    pub fn build(
        &self,
        name: &str,
        values: &RuleArgs,
        method: Option<&str>,
        force_external: bool,
    ) -> Result<String, BuildError> {
        let mut candidates = self
            .map
            .rules
            .iter()
            .filter(|compiled| compiled.rule.name.as_deref() == Some(name))
            .peekable();
        if candidates.peek().is_none() {
            return Err(BuildError {
                name: name.to_string(),
                reason: "no rule has this name".to_string(),
            });
        }

        for compiled in candidates {
            if let Some(method) = method {
                if !compiled.rule.allows_method(method) {
                    continue;
                }
            }
            if let Some(url) = self.build_rule(compiled, values, force_external) {
                return Ok(url);
            }
        }

        Err(BuildError {
            name: name.to_string(),
            reason: format!("values {values:?} are missing or do not fit the rule arguments"),
        })
    }

    fn build_rule(
        &self,
        compiled: &CompiledRule,
        values: &RuleArgs,
        force_external: bool,
    ) -> Option<String> {
        let rule = &compiled.rule;
        let arguments = compiled.arguments();

        // A default that is not an argument pins the rule to that value.
        for (key, default) in &rule.defaults {
            if !arguments.contains(key.as_str()) {
                if let Some(value) = values.get(key) {
                    if value != default {
                        return None;
                    }
                }
            }
        }

        let mut all_values = rule.defaults.clone();
        all_values.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let path = compiled.path.build(&all_values, url_quote)?;
        let subdomain = match &compiled.subdomain {
            Some(pattern) => pattern.build(&all_values, |v| v.to_string())?,
            None => self.map.default_subdomain.clone(),
        };

        let query: Vec<(&str, &str)> = values
            .iter()
            .filter(|(key, _)| {
                !arguments.contains(key.as_str()) && !rule.defaults.contains_key(key.as_str())
            })
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let query = serde_urlencoded::to_string(&query).unwrap_or_default();

        if force_external || subdomain != self.subdomain {
            Some(self.make_url(&subdomain, &path, &query))
        } else {
            let mut url = format!("{}{}", self.script_name, path);
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
            Some(url)
        }
    }

    fn host(&self, subdomain: &str) -> String {
        if subdomain.is_empty() {
            self.server_name.clone()
        } else {
            format!("{subdomain}.{}", self.server_name)
        }
    }

    fn make_url(&self, subdomain: &str, path: &str, query: &str) -> String {
        let mut url = format!(
            "{}://{}{}{}",
            self.url_scheme,
            self.host(subdomain),
            self.script_name,
            path
        );
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn redirect_target(&self, target: &str, args: &RuleArgs) -> String {
        if target.contains("://") {
            return target.to_string();
        }
        let path = match Pattern::parse(target) {
            Ok(pattern) => pattern
                .build(args, url_quote)
                .unwrap_or_else(|| target.to_string()),
            Err(_) => target.to_string(),
        };
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        format!(
            "{}://{}{}{}",
            self.url_scheme,
            self.host(&self.subdomain),
            self.script_name,
            path
        )
    }
}
