use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{ConfigError, ConfigValue, ModuleConfig, REQUIRED_VALUE};

/// Produces the default configuration of a module.
pub type DefaultsLoader = Arc<dyn Fn() -> ModuleConfig + Send + Sync>;

/// Implemented by components that own a configuration module.
///
/// ```
/// use tipfy_config::{Config, DefaultConfig, ModuleConfig};
///
/// struct Mailer;
///
/// impl DefaultConfig for Mailer {
///     const MODULE: &'static str = "app.mailer";
///
///     fn default_config() -> ModuleConfig {
///         ModuleConfig::new().with("sender", "noreply@localhost").required("smtp_host")
///     }
/// }
///
/// let config = Config::new();
/// config.register::<Mailer>();
/// assert_eq!(config.get("app.mailer", "sender").unwrap(), "noreply@localhost");
/// assert!(config.get("app.mailer", "smtp_host").is_err());
/// ```
pub trait DefaultConfig {
    const MODULE: &'static str;

    fn default_config() -> ModuleConfig;
}

#[derive(Default)]
struct ConfigState {
    modules: FxHashMap<String, ModuleConfig>,
    loaded: FxHashSet<String>,
}

/// Application configuration: module name -> key -> value.
///
/// Defaults declared by a module are merged the first time the module is
/// read, without overriding values the user already set. A module is
/// loaded once; emptying it afterwards does not bring its defaults back.
#[derive(Default)]
pub struct Config {
    state: RwLock<ConfigState>,
    defaults: RwLock<FxHashMap<String, DefaultsLoader>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from a JSON object of module objects.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config = Self::new();
        let Value::Object(modules) = value else {
            return Err(ConfigError::NotAMapping {
                module: String::new(),
            });
        };
        for (module, values) in modules {
            config.update_value(&module, values)?;
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Registers the default configuration provider for `module`.
    pub fn register_defaults<F>(&self, module: &str, loader: F)
    where
        F: Fn() -> ModuleConfig + Send + Sync + 'static,
    {
        self.defaults
            .write()
            .insert(module.to_string(), Arc::new(loader));
    }

    pub fn register<M: DefaultConfig + 'static>(&self) {
        self.register_defaults(M::MODULE, M::default_config);
    }

    pub fn is_loaded(&self, module: &str) -> bool {
        self.state.read().loaded.contains(module)
    }

    /// Replaces the whole configuration of `module`.
    pub fn set(&self, module: &str, values: ModuleConfig) {
        self.state.write().modules.insert(module.to_string(), values);
    }

    pub fn set_value(&self, module: &str, values: Value) -> Result<(), ConfigError> {
        let values = Self::module_from_value(module, values)?;
        self.set(module, values);
        Ok(())
    }

    /// Merges `values` into `module`, replacing existing keys.
    pub fn update(&self, module: &str, values: ModuleConfig) {
        self.state
            .write()
            .modules
            .entry(module.to_string())
            .or_default()
            .update(&values);
    }

    pub fn update_value(&self, module: &str, values: Value) -> Result<(), ConfigError> {
        let values = Self::module_from_value(module, values)?;
        self.update(module, values);
        Ok(())
    }

    /// Merges `values` into `module`, keeping keys that are already set.
    pub fn setdefault(&self, module: &str, values: ModuleConfig) {
        self.state
            .write()
            .modules
            .entry(module.to_string())
            .or_default()
            .setdefault(&values);
    }

    pub fn setdefault_value(&self, module: &str, values: Value) -> Result<(), ConfigError> {
        let values = Self::module_from_value(module, values)?;
        self.setdefault(module, values);
        Ok(())
    }

    /// Returns a required config value.
    pub fn get(&self, module: &str, key: &str) -> Result<Value, ConfigError> {
        self.get_or(module, key, REQUIRED_VALUE)
    }

    /// Returns a config value, or `default` when the key is not set.
    ///
    /// A `default` of [`REQUIRED_VALUE`] turns a missing key into an error.
    pub fn get_or(
        &self,
        module: &str,
        key: &str,
        default: impl Into<ConfigValue>,
    ) -> Result<Value, ConfigError> {
        self.load_module(module);

        let default = default.into();
        let state = self.state.read();
        let resolved = match state.modules.get(module) {
            Some(values) => values.get(key).cloned().unwrap_or(default),
            None if default.is_required() => {
                return Err(ConfigError::ModuleNotConfigured {
                    module: module.to_string(),
                });
            }
            None => default,
        };

        match resolved {
            ConfigValue::Required => Err(ConfigError::required(module, key)),
            ConfigValue::Value(value) => Ok(value),
        }
    }

    /// Returns a required config value deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, module: &str, key: &str) -> Result<T, ConfigError> {
        let value = self.get(module, key)?;
        serde_json::from_value(value).map_err(|source| ConfigError::InvalidValue {
            module: module.to_string(),
            key: key.to_string(),
            source,
        })
    }

    /// Returns the whole configuration of `module`.
    pub fn get_module(&self, module: &str) -> Result<ModuleConfig, ConfigError> {
        self.load_module(module);
        self.state
            .read()
            .modules
            .get(module)
            .cloned()
            .ok_or_else(|| ConfigError::ModuleNotConfigured {
                module: module.to_string(),
            })
    }

    pub fn get_module_or(&self, module: &str, default: ModuleConfig) -> ModuleConfig {
        self.get_module(module).unwrap_or(default)
    }

    fn load_module(&self, module: &str) {
        if self.is_loaded(module) {
            return;
        }

        let Some(loader) = self.defaults.read().get(module).cloned() else {
            return;
        };
        let defaults = loader();

        let mut state = self.state.write();
        if !state.loaded.insert(module.to_string()) {
            return;
        }
        debug!(module, keys = defaults.len(), "loaded module default config");
        state
            .modules
            .entry(module.to_string())
            .or_default()
            .setdefault(&defaults);
    }

    fn module_from_value(module: &str, values: Value) -> Result<ModuleConfig, ConfigError> {
        match values {
            Value::Object(map) => Ok(ModuleConfig::from(map)),
            _ => Err(ConfigError::NotAMapping {
                module: module.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Config")
            .field("modules", &state.modules)
            .field("loaded", &state.loaded)
            .finish()
    }
}
