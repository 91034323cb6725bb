use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

/// A configured value, or the marker for a key that must be supplied by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Required,
    Value(Value),
}

/// Marks a key that has no usable default. Reading it before the user sets it is an error.
pub const REQUIRED_VALUE: ConfigValue = ConfigValue::Required;

impl ConfigValue {
    pub fn is_required(&self) -> bool {
        matches!(self, ConfigValue::Required)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConfigValue::Required => None,
            ConfigValue::Value(value) => Some(value),
        }
    }
}

impl<T: Into<Value>> From<T> for ConfigValue {
    fn from(value: T) -> Self {
        ConfigValue::Value(value.into())
    }
}

/// Argument sentinel meaning "use the module's configured default".
///
/// `Option<T>` cannot play this role because `None` is a legitimate
/// configured value (e.g. a session without max age).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultOr<T> {
    #[default]
    Default,
    Value(T),
}

impl<T> DefaultOr<T> {
    pub fn resolve(self, configured: impl FnOnce() -> T) -> T {
        match self {
            DefaultOr::Default => configured(),
            DefaultOr::Value(value) => value,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, DefaultOr::Default)
    }
}

impl<T> From<T> for DefaultOr<T> {
    fn from(value: T) -> Self {
        DefaultOr::Value(value)
    }
}

/// The key/value mapping owned by one configured module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleConfig {
    values: FxHashMap<String, ConfigValue>,
}

impl ModuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used to declare defaults.
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style declaration of a key the user must configure.
    pub fn required(mut self, key: &str) -> Self {
        self.values.insert(key.to_string(), REQUIRED_VALUE);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.values.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copies every entry of `other` whose key is not present yet.
    pub fn setdefault(&mut self, other: &ModuleConfig) {
        for (key, value) in &other.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Copies every entry of `other`, replacing existing keys.
    pub fn update(&mut self, other: &ModuleConfig) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Renders the mapping as JSON. Required keys that were never set become `null`.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), value.as_value().cloned().unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }
}

impl From<Map<String, Value>> for ModuleConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map
                .into_iter()
                .map(|(key, value)| (key, ConfigValue::Value(value)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ModuleConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setdefault_keeps_existing_values() {
        let mut config = ModuleConfig::new().with("foo", "user");
        let defaults = ModuleConfig::new().with("foo", "default").with("bar", 1);

        config.setdefault(&defaults);

        assert_eq!(config.get("foo"), Some(&ConfigValue::from("user")));
        assert_eq!(config.get("bar"), Some(&ConfigValue::from(1)));
    }

    #[test]
    fn test_update_replaces_values() {
        let mut config = ModuleConfig::new().with("foo", "user");
        config.update(&ModuleConfig::new().with("foo", "new"));

        assert_eq!(config.get("foo"), Some(&ConfigValue::from("new")));
    }

    #[test]
    fn test_to_value_renders_required_as_null() {
        let config = ModuleConfig::new().required("secret").with("name", "x");
        assert_eq!(config.to_value(), json!({"secret": null, "name": "x"}));
    }

    #[test]
    fn test_default_or_resolve() {
        let configured: DefaultOr<Option<u64>> = DefaultOr::Default;
        assert_eq!(configured.resolve(|| Some(10)), Some(10));

        let explicit: DefaultOr<Option<u64>> = None.into();
        assert_eq!(explicit.resolve(|| Some(10)), None);
    }
}
