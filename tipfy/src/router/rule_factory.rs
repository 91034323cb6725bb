use super::{HandlerRef, Rule};

/// Anything that expands into rules.
pub trait RuleFactory {
    fn get_rules(&self) -> Vec<Rule>;
}

impl RuleFactory for Rule {
    fn get_rules(&self) -> Vec<Rule> {
        vec![self.clone()]
    }
}

impl<F: RuleFactory> RuleFactory for Vec<F> {
    fn get_rules(&self) -> Vec<Rule> {
        self.iter().flat_map(RuleFactory::get_rules).collect()
    }
}

/// Prefixes the path of every rule.
///
/// ```
/// use tipfy::{Rule, RuleFactory, Submount};
///
/// let rules = Submount::new("/admin", vec![Rule::new("/users").name("users")]).get_rules();
/// assert_eq!(rules[0].path, "/admin/users");
/// ```
pub struct Submount {
    path: String,
    rules: Vec<Rule>,
}

impl Submount {
    pub fn new(path: &str, rules: impl RuleFactory) -> Self {
        Self {
            path: path.trim_end_matches('/').to_string(),
            rules: rules.get_rules(),
        }
    }
}

impl RuleFactory for Submount {
    fn get_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                rule.path = format!("{}{}", self.path, rule.path);
                rule
            })
            .collect()
    }
}

/// Puts every rule on a subdomain.
pub struct Subdomain {
    subdomain: String,
    rules: Vec<Rule>,
}

impl Subdomain {
    pub fn new(subdomain: &str, rules: impl RuleFactory) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            rules: rules.get_rules(),
        }
    }
}

impl RuleFactory for Subdomain {
    fn get_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|rule| rule.clone().subdomain(&self.subdomain))
            .collect()
    }
}

/// Prefixes the name of every rule.
pub struct NamePrefix {
    prefix: String,
    rules: Vec<Rule>,
}

impl NamePrefix {
    pub fn new(prefix: &str, rules: impl RuleFactory) -> Self {
        Self {
            prefix: prefix.to_string(),
            rules: rules.get_rules(),
        }
    }
}

impl RuleFactory for NamePrefix {
    fn get_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                // The handler keeps pointing at the unprefixed name.
                if rule.handler.is_none() {
                    rule.handler = rule.handler_ref();
                }
                if let Some(name) = &rule.name {
                    rule.name = Some(format!("{}{}", self.prefix, name));
                }
                rule
            })
            .collect()
    }
}

/// Prefixes handler names, e.g. a package path shared by a group of rules.
pub struct HandlerPrefix {
    prefix: String,
    rules: Vec<Rule>,
}

impl HandlerPrefix {
    pub fn new(prefix: &str, rules: impl RuleFactory) -> Self {
        Self {
            prefix: prefix.to_string(),
            rules: rules.get_rules(),
        }
    }
}

impl RuleFactory for HandlerPrefix {
    fn get_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                if let Some(HandlerRef::Named(handler)) = rule.handler_ref() {
                    rule.handler = Some(HandlerRef::Named(format!("{}{}", self.prefix, handler)));
                }
                rule
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_handler(rule: &Rule) -> Option<String> {
        match rule.handler_ref() {
            Some(HandlerRef::Named(name)) => Some(name),
            _ => None,
        }
    }

    #[test]
    fn test_nested_factories() {
        let rules = Submount::new(
            "/admin/",
            NamePrefix::new(
                "admin-",
                HandlerPrefix::new(
                    "handlers.admin.",
                    vec![
                        Rule::new("/").name("index").handler("Index"),
                        Rule::new("/users/<id>").name("user"),
                    ],
                ),
            ),
        )
        .get_rules();

        assert_eq!(rules[0].path, "/admin/");
        assert_eq!(rules[0].name.as_deref(), Some("admin-index"));
        assert_eq!(named_handler(&rules[0]).as_deref(), Some("handlers.admin.Index"));

        assert_eq!(rules[1].path, "/admin/users/<id>");
        assert_eq!(rules[1].name.as_deref(), Some("admin-user"));
        assert_eq!(named_handler(&rules[1]).as_deref(), Some("handlers.admin.user"));
    }

    #[test]
    fn test_subdomain() {
        let rules = Subdomain::new("<username>", vec![Rule::new("/").name("home")]).get_rules();
        assert_eq!(rules[0].subdomain.as_deref(), Some("<username>"));
    }
}
