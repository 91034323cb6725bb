//! Per-request registry of typed singletons.
//!
//! Extensions use the registry to cache objects that live exactly as long as
//! one request, such as the session store of the current request.
//!
//! # Examples
//!
//! ```
//! use tipfy::http_helpers::Registry;
//!
//! struct CurrentUser(String);
//!
//! let mut registry = Registry::new();
//! let user = registry.get_or_insert_with(|| CurrentUser("calvin".to_string()));
//! assert_eq!(user.0, "calvin");
//!
//! // The second call reuses the cached value.
//! let user = registry.get_or_insert_with(|| CurrentUser("hobbes".to_string()));
//! assert_eq!(user.0, "calvin");
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct Registry {
    map: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn get_or_insert_with<T, F>(&mut self, init: F) -> &mut T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let boxed = self
            .map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()));
        match boxed.downcast_mut() {
            Some(value) => value,
            // The entry is keyed by `TypeId::of::<T>()`.
            None => unreachable!("registry entry holds a value of another type"),
        }
    }

    /// Like [`Registry::get_or_insert_with`] for initializers that can fail.
    pub fn get_or_try_insert_with<T, E, F>(&mut self, init: F) -> Result<&mut T, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.contains::<T>() {
            self.insert(init()?);
        }
        Ok(self.get_or_insert_with(|| unreachable!("value inserted above")))
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.map.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct UserId(String);

    #[derive(Debug, PartialEq)]
    struct Counter(usize);

    #[test]
    fn test_insert_and_get() {
        let mut registry = Registry::new();

        registry.insert(UserId("alice".to_string()));
        registry.insert(Counter(1));

        assert_eq!(registry.get::<UserId>().unwrap().0, "alice");
        assert_eq!(registry.get::<Counter>().unwrap().0, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_or_try_insert_with_propagates_errors() {
        let mut registry = Registry::new();

        let result: Result<&mut Counter, &str> = registry.get_or_try_insert_with(|| Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!registry.contains::<Counter>());

        let counter: Result<&mut Counter, &str> = registry.get_or_try_insert_with(|| Ok(Counter(0)));
        counter.unwrap().0 += 1;
        assert_eq!(registry.get::<Counter>(), Some(&Counter(1)));
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::new();
        registry.insert(UserId("alice".to_string()));

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.remove::<UserId>().is_none());
    }
}
