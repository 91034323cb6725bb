//! # tipfy-axum
//!
//! Serves tipfy applications with axum and tokio.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tipfy::{Rule, TipfyFactory, handler_fn};
//! use tipfy_axum::AxumAdapter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tipfy_axum::init_tracing(true);
//!
//!     let app = TipfyFactory::new()
//!         .rules(vec![Rule::new("/").name("home").handler("home")])
//!         .register_handler_factory("home", || {
//!             Box::new(handler_fn(&["get"], |_, _, _| Ok("Hello, World!".into())))
//!         })
//!         .create()?;
//!
//!     AxumAdapter::new(app).listen(3000, "127.0.0.1").await
//! }
//! ```

mod axum_adapter;
mod axum_route_adapter;

pub use axum_adapter::AxumAdapter;
pub use axum_route_adapter::{AxumRouteAdapter, BodyTooLarge, DEFAULT_BODY_LIMIT};

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber. `RUST_LOG` wins over the default
/// level, which is `debug` for debug applications and `info` otherwise.
///
/// Does nothing when a subscriber is already installed.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
