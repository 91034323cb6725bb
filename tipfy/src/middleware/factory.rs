use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::{Error, Result};
use crate::traits_helpers::{Hook, Middleware, MiddlewareSpec};

/// Builds a middleware registered by name.
pub type MiddlewareConstructor = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Middleware of one owner, grouped by hook in the order they must run.
#[derive(Default, Clone)]
pub struct HookMap {
    hooks: FxHashMap<Hook, Vec<Arc<dyn Middleware>>>,
}

impl HookMap {
    pub fn get(&self, hook: Hook) -> &[Arc<dyn Middleware>] {
        self.hooks.get(&hook).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for HookMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for hook in Hook::ALL {
            let count = self.get(hook).len();
            if count > 0 {
                map.entry(&hook.as_str(), &count);
            }
        }
        map.finish()
    }
}

/// Resolves middleware specs into hook lists.
///
/// Every middleware type or name is constructed once and shared by all its
/// owners. The hook map of an owner is computed once per owner name.
#[derive(Default)]
pub struct MiddlewareFactory {
    constructors: FxHashMap<String, MiddlewareConstructor>,
    instances: RwLock<FxHashMap<String, Arc<dyn Middleware>>>,
    owners: RwLock<FxHashMap<String, Arc<HookMap>>>,
}

impl MiddlewareFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    pub fn register_type<M: Middleware + Default + 'static>(&mut self, name: &str) {
        self.register(name, || -> Arc<dyn Middleware> { Arc::new(M::default()) });
    }

    /// The hook map of `owner`, built from `specs` on first use.
    pub fn get_middleware(&self, owner: &str, specs: &[MiddlewareSpec]) -> Result<Arc<HookMap>> {
        if let Some(hooks) = self.owners.read().get(owner) {
            return Ok(hooks.clone());
        }

        let hooks = Arc::new(self.load_middleware(specs)?);
        Ok(self
            .owners
            .write()
            .entry(owner.to_string())
            .or_insert(hooks)
            .clone())
    }

    /// Builds a hook map without caching it.
    pub fn load_middleware(&self, specs: &[MiddlewareSpec]) -> Result<HookMap> {
        let mut map = HookMap::default();
        for spec in specs {
            let middleware = self.instance(spec)?;
            for hook in middleware.hooks() {
                map.hooks
                    .entry(*hook)
                    .or_default()
                    .push(Arc::clone(&middleware));
            }
        }
        for (hook, list) in map.hooks.iter_mut() {
            if hook.is_reversed() {
                list.reverse();
            }
        }
        Ok(map)
    }

    /// Number of middleware constructed from types or names so far.
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    fn instance(&self, spec: &MiddlewareSpec) -> Result<Arc<dyn Middleware>> {
        let (id, construct): (&str, &dyn Fn() -> Arc<dyn Middleware>) = match spec {
            MiddlewareSpec::Instance(middleware) => return Ok(Arc::clone(middleware)),
            MiddlewareSpec::Type { id, construct } => (id, construct),
            MiddlewareSpec::Named(name) => {
                let constructor = self
                    .constructors
                    .get(name)
                    .ok_or_else(|| Error::MiddlewareNotFound(name.clone()))?;
                (name.as_str(), constructor.as_ref())
            }
        };

        if let Some(middleware) = self.instances.read().get(id) {
            return Ok(Arc::clone(middleware));
        }
        let middleware = construct();
        Ok(Arc::clone(
            self.instances
                .write()
                .entry(id.to_string())
                .or_insert(middleware),
        ))
    }
}

impl fmt::Debug for MiddlewareFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareFactory")
            .field("registered", &self.constructors.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.read().len())
            .field("owners", &self.owners.read().len())
            .finish()
    }
}
