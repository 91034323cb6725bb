//! # tipfy-config
//!
//! Two-level configuration (module name -> key -> value) for the tipfy framework.
//!
//! ## Features
//!
//! - **Lazy defaults**: each module declares its defaults once; they are merged
//!   the first time the module is read and never override user values
//! - **Required keys**: [`REQUIRED_VALUE`] marks keys the user must set
//! - **Typed reads** through serde
//!
//! ## Basic Usage
//!
//! ```rust
//! use serde_json::json;
//! use tipfy_config::{Config, ModuleConfig};
//!
//! # fn main() -> Result<(), tipfy_config::ConfigError> {
//! let config = Config::from_value(json!({
//!     "tipfy.sessions": {"secret_key": "my secret"}
//! }))?;
//!
//! config.register_defaults("tipfy.sessions", || {
//!     ModuleConfig::new()
//!         .required("secret_key")
//!         .with("cookie_name", "session")
//! });
//!
//! assert_eq!(config.get("tipfy.sessions", "secret_key")?, json!("my secret"));
//! assert_eq!(config.get("tipfy.sessions", "cookie_name")?, json!("session"));
//! assert_eq!(config.get_or("tipfy.sessions", "missing", 10)?, json!(10));
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod value;

pub use config::{Config, DefaultConfig, DefaultsLoader};
pub use error::ConfigError;
pub use value::{ConfigValue, DefaultOr, ModuleConfig, REQUIRED_VALUE};
