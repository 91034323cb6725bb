use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Module {module:?} is not configured and declares no default configuration")]
    ModuleNotConfigured { module: String },

    #[error("Module {module:?} requires the config key {key:?} to be set")]
    RequiredKey { module: String, key: String },

    #[error("Configuration for module {module:?} must be a mapping")]
    NotAMapping { module: String },

    #[error("Invalid value for {module}.{key}: {source}")]
    InvalidValue {
        module: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn required(module: &str, key: &str) -> Self {
        ConfigError::RequiredKey {
            module: module.to_string(),
            key: key.to_string(),
        }
    }
}
