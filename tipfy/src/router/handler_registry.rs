use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::HandlerFactory;
use crate::errors::{Error, Result};
use crate::traits_helpers::RequestHandler;

/// Produces the factory registered under a handler name.
pub type HandlerLoader = Arc<dyn Fn() -> HandlerFactory + Send + Sync>;

/// Registration table for handlers referenced by name from rules.
///
/// Loaders run at most once per name; the factory they return is cached for
/// the lifetime of the application.
#[derive(Default)]
pub struct HandlerRegistry {
    loaders: FxHashMap<String, HandlerLoader>,
    resolved: RwLock<FxHashMap<String, HandlerFactory>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, name: &str)
    where
        H: RequestHandler + Default + 'static,
    {
        self.register_factory(
            name,
            Arc::new(|| -> Box<dyn RequestHandler> { Box::new(H::default()) }),
        );
    }

    pub fn register_factory(&mut self, name: &str, factory: HandlerFactory) {
        self.register_lazy(name, move || factory.clone());
    }

    pub fn register_lazy<F>(&mut self, name: &str, loader: F)
    where
        F: Fn() -> HandlerFactory + Send + Sync + 'static,
    {
        self.loaders.insert(name.to_string(), Arc::new(loader));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolved.read().contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<HandlerFactory> {
        if let Some(factory) = self.resolved.read().get(name) {
            return Ok(factory.clone());
        }

        let loader = self
            .loaders
            .get(name)
            .ok_or_else(|| Error::HandlerNotFound(name.to_string()))?;
        let factory = loader();
        Ok(self
            .resolved
            .write()
            .entry(name.to_string())
            .or_insert(factory)
            .clone())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.loaders.keys().collect::<Vec<_>>())
            .field("resolved", &self.resolved.read().len())
            .finish()
    }
}
